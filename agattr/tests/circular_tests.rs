use std::cell::{Cell, RefCell};
use std::rc::Rc;

use agattr::tests_utils::{
    CfgIds, Num, Stmt, Vars, branch_cfg, branch_cfg_reversed, defs, sample_pair_tree, successors, uses,
    vars,
};
use agattr::{CircleGroup, Circular};
use agtree::Tree;

type LiveAttr = Rc<Circular<Stmt, Vars>>;
type Slot = Rc<RefCell<Option<LiveAttr>>>;

struct Liveness {
    live_in: LiveAttr,
    live_out: LiveAttr,
    in_evals: Rc<Cell<u32>>,
}

/// Classic backward dataflow:
///   live_in(s)  = uses(s) ∪ (live_out(s) \ defs(s))
///   live_out(s) = ∪ { live_in(t) | t successor of s }
fn liveness(tree: &Rc<Tree<Stmt>>) -> Liveness {
    let _ = env_logger::builder().is_test(true).try_init();
    let group = CircleGroup::new();
    let in_slot: Slot = Rc::new(RefCell::new(None));
    let out_slot: Slot = Rc::new(RefCell::new(None));
    let in_evals = Rc::new(Cell::new(0u32));

    let live_in = group.circular("live_in", Vars::new(), Rc::clone(tree), {
        let tree = Rc::clone(tree);
        let out_slot = Rc::clone(&out_slot);
        let in_evals = Rc::clone(&in_evals);
        move |n| {
            in_evals.set(in_evals.get() + 1);
            if tree[n].is_block() {
                return Ok(Some(Vars::new()));
            }
            let out = out_slot.borrow().as_ref().unwrap().clone().get(n)?;
            let mut live = uses(&tree, n);
            live.extend(out.difference(&defs(&tree, n)).copied());
            Ok(Some(live))
        }
    });

    let live_out = group.circular("live_out", Vars::new(), Rc::clone(tree), {
        let tree = Rc::clone(tree);
        let in_slot = Rc::clone(&in_slot);
        move |n| {
            if tree[n].is_block() {
                return Ok(Some(Vars::new()));
            }
            let live_in = in_slot.borrow().as_ref().unwrap().clone();
            let mut live = Vars::new();
            for succ in successors(&tree, n) {
                live.extend(live_in.get(succ)?);
            }
            Ok(Some(live))
        }
    });

    *in_slot.borrow_mut() = Some(Rc::clone(&live_in));
    *out_slot.borrow_mut() = Some(Rc::clone(&live_out));
    Liveness {
        live_in,
        live_out,
        in_evals,
    }
}

fn assert_liveness(live: &Liveness, ids: &CfgIds) {
    assert_eq!(live.live_in.get(ids.s1).unwrap(), Vars::new());
    assert_eq!(live.live_in.get(ids.s2).unwrap(), vars(&["x"]));
    assert_eq!(live.live_in.get(ids.s3).unwrap(), vars(&["x"]));
    assert_eq!(live.live_out.get(ids.s1).unwrap(), vars(&["x"]));
    assert_eq!(live.live_out.get(ids.s2).unwrap(), vars(&["x"]));
    assert_eq!(live.live_out.get(ids.s3).unwrap(), Vars::new());
}

#[test]
fn mutual_recursion_converges_to_the_fixed_point() {
    let (tree, ids) = branch_cfg();
    let live = liveness(&tree);

    assert_liveness(&live, &ids);
    assert!(live.live_in.has_been_computed_at(ids.block));
}

#[test]
fn convergence_is_iteration_order_independent() {
    let (tree_a, ids_a) = branch_cfg();
    let (tree_b, ids_b) = branch_cfg_reversed();

    let live_a = liveness(&tree_a);
    let live_b = liveness(&tree_b);

    for (&a, &b) in [ids_a.s1, ids_a.s2, ids_a.s3]
        .iter()
        .zip([ids_b.s1, ids_b.s2, ids_b.s3].iter())
    {
        assert_eq!(live_a.live_in.get(a).unwrap(), live_b.live_in.get(b).unwrap());
        assert_eq!(
            live_a.live_out.get(a).unwrap(),
            live_b.live_out.get(b).unwrap()
        );
    }
}

#[test]
fn no_recomputation_after_convergence() {
    let (tree, ids) = branch_cfg();
    let live = liveness(&tree);

    live.live_in.get(ids.s1).unwrap();
    let evals_after_fixpoint = live.in_evals.get();
    assert!(evals_after_fixpoint > 0);

    assert_liveness(&live, &ids);
    assert_eq!(
        live.in_evals.get(),
        evals_after_fixpoint,
        "post-convergence gets must be served from final cells"
    );
}

#[test]
fn reset_discards_final_values_and_reconverges() {
    let (tree, ids) = branch_cfg();
    let live = liveness(&tree);

    let before = live.live_in.get(ids.s2).unwrap();
    live.live_in.reset();
    live.live_out.reset();
    assert!(!live.live_in.has_been_computed_at(ids.s2));

    assert_eq!(live.live_in.get(ids.s2).unwrap(), before);
}

#[test]
fn approximation_reads_replace_cycle_errors() {
    // A directly self-referential attribute: each sweep reads its own
    // approximation and bumps it toward a cap. A basic attribute would
    // fail with a cycle here; the fixpoint engine converges instead.
    let (tree, ids) = sample_pair_tree();
    let group = CircleGroup::new();
    let slot: Rc<RefCell<Option<Rc<Circular<Num, i32>>>>> = Rc::new(RefCell::new(None));
    let settle = group.circular("settle", 0i32, Rc::clone(&tree), {
        let slot = Rc::clone(&slot);
        move |n| {
            let me: Rc<Circular<_, i32>> = slot.borrow().as_ref().unwrap().clone();
            let current = me.get(n)?;
            Ok(Some((current + 1).min(3)))
        }
    });
    *slot.borrow_mut() = Some(Rc::clone(&settle));

    assert_eq!(settle.get(ids.root).unwrap(), 3);
    assert_eq!(settle.get(ids.leaf1).unwrap(), 3);
    assert!(!group.in_circle());
}

#[test]
fn failed_pass_leaves_no_finalized_cells() {
    let (tree, ids) = branch_cfg();
    let group = CircleGroup::new();
    // Covers blocks and assignments, but not branches.
    let partial = group.circular("reach", 0u32, Rc::clone(&tree), {
        let tree = Rc::clone(&tree);
        move |n| match tree[n] {
            Stmt::Branch { .. } => Ok(None),
            _ => Ok(Some(1)),
        }
    });

    let err = partial.get(ids.s1).unwrap_err();
    assert!(err.is_no_rule_for());
    assert!(err.to_string().contains("reach"));

    // The aborted pass cleared its flag and its approximations.
    assert!(!group.in_circle());
    for id in [ids.block, ids.s1, ids.s2, ids.s3] {
        assert!(!partial.has_been_computed_at(id));
    }
}
