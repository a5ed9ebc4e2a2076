//! Static checks over a parsed program.

use super::ast::*;

/// Lines of statements that follow an unconditional `return` in the same body.
///
/// Only the first unreachable statement of each body is reported.
pub fn unreachable_after_return(program: &Program) -> Vec<usize> {
    let mut lines = Vec::new();
    visit_body(&program.body, &mut lines);
    lines.sort_unstable();
    lines.dedup();
    lines
}

fn visit_body(body: &[Expr], lines: &mut Vec<usize>) {
    let mut returned = false;
    for expr in body {
        if returned {
            lines.push(expr.line);
            break;
        }
        visit_expr(expr, lines);
        returned = matches!(expr.kind, ExprKind::Return(_));
    }
}

fn visit_expr(expr: &Expr, lines: &mut Vec<usize>) {
    match &expr.kind {
        ExprKind::Def(def) => visit_body(&def.body, lines),
        ExprKind::If {
            then_body,
            else_body,
            ..
        } => {
            visit_body(then_body, lines);
            if let Some(else_body) = else_body {
                visit_body(else_body, lines);
            }
        }
        ExprKind::While { body, .. } | ExprKind::Begin(body) => visit_body(body, lines),
        ExprKind::Call(call) => {
            if let Some(block) = &call.block {
                visit_body(&block.body, lines);
            }
        }
        ExprKind::Assign(_, rhs) => visit_expr(rhs, lines),
        _ => (),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::parser::parse_program;

    #[test]
    fn statement_after_return_is_reported() {
        let src = "def stylish_painter\n  best_hairstyle = \"Bob Ross\"\n  return \"Jean-Michel Basquiat\"\n  puts best_hairstyle\nend";
        let program = parse_program(src).unwrap();
        assert_eq!(unreachable_after_return(&program), vec![4]);
    }

    #[test]
    fn guarded_return_is_not_reported() {
        let src = "def f(x)\n  return nil if x.nil?\n  x\nend\nf(1)";
        let program = parse_program(src).unwrap();
        assert!(unreachable_after_return(&program).is_empty());
    }
}
