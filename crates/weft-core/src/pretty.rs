//! Source-form rendering of operations and expressions
//!
//! Used by error-trace rendering and diagnostics; output matches the
//! `.weft` surface syntax.

use crate::ast::{BinOp, Expr, Op, Program, ThreadDef, UnOp};

/// Render an operation the way it was written, with real names.
pub fn op_to_string(program: &Program, thread: &ThreadDef, op: &Op) -> String {
    match op {
        Op::Write { var, value } => format!(
            "write {} = {}",
            program.var_name(*var),
            expr_to_string(thread, value)
        ),
        Op::Read { dst, var } => format!(
            "let {} = read {}",
            thread.regs[dst.as_usize()],
            program.var_name(*var)
        ),
        Op::Fadd { dst, var, operand } => {
            let rhs = format!(
                "fadd {}, {}",
                program.var_name(*var),
                expr_to_string(thread, operand)
            );
            match dst {
                Some(dst) => format!("let {} = {rhs}", thread.regs[dst.as_usize()]),
                None => rhs,
            }
        }
        Op::Fence => "fence".to_string(),
        Op::Lock(lock) => format!("lock {}", program.lock_name(*lock)),
        Op::Unlock(lock) => format!("unlock {}", program.lock_name(*lock)),
        Op::Spawn(tid) => format!("spawn {}", program.thread_name(*tid)),
        Op::Join(tid) => format!("join {}", program.thread_name(*tid)),
        Op::Assert(e) => format!("assert {}", expr_to_string(thread, e)),
        Op::Assume(e) => format!("assume {}", expr_to_string(thread, e)),
    }
}

/// Render an expression, parenthesizing by precedence.
pub fn expr_to_string(thread: &ThreadDef, expr: &Expr) -> String {
    render_expr(thread, expr, 0)
}

fn precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
        BinOp::Add | BinOp::Sub => 4,
        BinOp::Mul => 5,
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn render_expr(thread: &ThreadDef, expr: &Expr, min_prec: u8) -> String {
    match expr {
        Expr::Int(n) => n.to_string(),
        Expr::Reg(r) => thread.regs[r.as_usize()].clone(),
        Expr::Unary(op, e) => {
            let sym = match op {
                UnOp::Neg => "-",
                UnOp::Not => "!",
            };
            format!("{sym}{}", render_expr(thread, e, 6))
        }
        Expr::Binary(op, a, b) => {
            let prec = precedence(*op);
            // Left-associative: the right operand needs one more level.
            let s = format!(
                "{} {} {}",
                render_expr(thread, a, prec),
                op_symbol(*op),
                render_expr(thread, b, prec + 1)
            );
            if prec < min_prec {
                format!("({s})")
            } else {
                s
            }
        }
    }
}
