//! Property-based tests: the reduced exploration is checked differentially
//! against the exhaustive reference on randomly generated small programs.

use proptest::prelude::*;
use weft_check::{check, CheckConfig, ErrorPolicy, Reduction};
use weft_core::{BinOp, Expr, LockId, Op, Program, Reg, ThreadDef, VarId};

/// One generated operation. Every thread declares a single register `r`, so
/// reads and the guarded assert are always well-formed.
fn arb_op(var_count: u32) -> impl Strategy<Value = Op> {
    let var = (0..var_count).prop_map(VarId);
    prop_oneof![
        (var.clone(), -2i64..=2).prop_map(|(var, v)| Op::Write {
            var,
            value: Expr::Int(v)
        }),
        var.clone().prop_map(|var| Op::Read { dst: Reg(0), var }),
        var.prop_map(|var| Op::Fadd {
            dst: None,
            var,
            operand: Expr::Int(1)
        }),
    ]
}

fn arb_thread(name: String, var_count: u32) -> impl Strategy<Value = ThreadDef> {
    (
        proptest::collection::vec(arb_op(var_count), 1..=2),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(move |(mut ops, locked, asserted)| {
            if locked {
                ops.insert(0, Op::Lock(LockId(0)));
                ops.push(Op::Unlock(LockId(0)));
            }
            if asserted {
                // Read-then-check: fails in schedules where another thread
                // got a write in first.
                ops.push(Op::Read {
                    dst: Reg(0),
                    var: VarId(0),
                });
                ops.push(Op::Assert(Expr::Binary(
                    BinOp::Le,
                    Box::new(Expr::Reg(Reg(0))),
                    Box::new(Expr::Int(0)),
                )));
            }
            ThreadDef {
                name: name.clone(),
                deferred: false,
                regs: vec!["r".to_string()],
                ops,
            }
        })
}

/// `max_threads` stays small because the exhaustive reference enumerates
/// every interleaving; two 7-step threads already mean thousands of runs.
fn arb_program(max_threads: usize) -> impl Strategy<Value = Program> {
    (2usize..=max_threads, 1u32..=2).prop_flat_map(|(threads, var_count)| {
        let defs: Vec<_> = (0..threads)
            .map(|i| arb_thread(format!("t{i}"), var_count))
            .collect();
        defs.prop_map(move |threads| Program {
            threads,
            vars: (0..var_count).map(|i| format!("v{i}")).collect(),
            locks: vec!["m".to_string()],
        })
    })
}

fn keep_going(reduction: Reduction) -> CheckConfig {
    CheckConfig::new()
        .with_reduction(reduction)
        .with_policy(ErrorPolicy::KeepGoing)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The same program checked twice yields the same counts and verdict.
    #[test]
    fn exploration_is_deterministic(program in arb_program(2)) {
        program.validate().unwrap();
        let first = check(&program, &keep_going(Reduction::Dpor)).unwrap();
        let second = check(&program, &keep_going(Reduction::Dpor)).unwrap();
        prop_assert_eq!(first.trace_count, second.trace_count);
        prop_assert_eq!(
            first.sleepset_blocked_trace_count,
            second.sleepset_blocked_trace_count
        );
        prop_assert_eq!(first.has_errors(), second.has_errors());
        if let (Some(a), Some(b)) = (&first.error, &second.error) {
            prop_assert_eq!(a.kind, b.kind);
            prop_assert_eq!(a.render(2), b.render(2));
        }
    }

    /// DPOR agrees with the exhaustive reference on error presence and
    /// never explores more schedules.
    #[test]
    fn dpor_matches_exhaustive_reference(program in arb_program(2)) {
        program.validate().unwrap();
        let reduced = check(&program, &keep_going(Reduction::Dpor)).unwrap();
        let full = check(&program, &keep_going(Reduction::Exhaustive)).unwrap();

        prop_assert!(reduced.complete);
        prop_assert!(full.complete);
        prop_assert_eq!(
            reduced.has_errors(),
            full.has_errors(),
            "reduction changed the verdict"
        );
        if let (Some(a), Some(b)) = (&reduced.error, &full.error) {
            prop_assert_eq!(a.kind, b.kind);
        }
        prop_assert!(
            reduced.trace_count + reduced.sleepset_blocked_trace_count
                <= full.trace_count,
            "reduction explored more than the reference ({} + {} > {})",
            reduced.trace_count,
            reduced.sleepset_blocked_trace_count,
            full.trace_count
        );
        prop_assert!(reduced.trace_count >= 1);
    }

    /// Flagging plain races never changes how many schedules exist, only
    /// the verdict.
    #[test]
    fn race_flagging_only_affects_verdict(program in arb_program(2)) {
        program.validate().unwrap();
        let plain = check(&program, &keep_going(Reduction::Dpor)).unwrap();
        let flagged = check(
            &program,
            &keep_going(Reduction::Dpor).with_flag_races(true),
        )
        .unwrap();
        prop_assert_eq!(plain.trace_count, flagged.trace_count);
        prop_assert_eq!(
            plain.sleepset_blocked_trace_count,
            flagged.sleepset_blocked_trace_count
        );
        // An error without flagging is still an error with it.
        if plain.has_errors() {
            prop_assert!(flagged.has_errors());
        }
    }
}
