// src/commands/parse.rs
//! Dependency expression inspection

use anyhow::{Context, Result};
use rpmcopy::dependencies::DepExpr;

/// Parse an expression and print it as an indented tree
pub fn cmd_parse(expression: &str) -> Result<()> {
    let expr = DepExpr::parse(expression).context("Invalid dependency expression")?;
    println!("{}", expr);
    print_tree(&expr, 0);
    Ok(())
}

fn print_tree(expr: &DepExpr, depth: usize) {
    let indent = "  ".repeat(depth);
    match expr {
        DepExpr::Atom(cap) => println!("{}atom {}", indent, cap),
        DepExpr::And(l, r) | DepExpr::Or(l, r) | DepExpr::With(l, r) | DepExpr::Without(l, r) => {
            let op = match expr {
                DepExpr::And(..) => "and",
                DepExpr::Or(..) => "or",
                DepExpr::With(..) => "with",
                _ => "without",
            };
            println!("{}{}", indent, op);
            print_tree(l, depth + 1);
            print_tree(r, depth + 1);
        }
        DepExpr::If {
            then,
            condition,
            otherwise,
        }
        | DepExpr::Unless {
            then,
            condition,
            otherwise,
        } => {
            let op = if matches!(expr, DepExpr::If { .. }) { "if" } else { "unless" };
            println!("{}{}", indent, op);
            print_tree(then, depth + 1);
            println!("{}condition", indent);
            print_tree(condition, depth + 1);
            if let Some(otherwise) = otherwise {
                println!("{}else", indent);
                print_tree(otherwise, depth + 1);
            }
        }
        DepExpr::Group(inner) => print_tree(inner, depth),
    }
}
