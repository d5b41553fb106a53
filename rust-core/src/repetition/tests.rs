use crate::fixtures::{pair, ring};
use crate::{ActorId, BalanceEquations, ModelError, RepetitionVectorComputer, ScenarioGraph};

#[test]
fn multirate_pair() {
    let (g, a, b) = pair(2, 3, 1, 1);
    let q = BalanceEquations.compute(&g).unwrap();
    assert_eq!(q[a], 3);
    assert_eq!(q[b], 2);
    assert_eq!(q.max(), 3);
}

#[test]
fn homogeneous_ring_fires_once() {
    let q = BalanceEquations.compute(&ring(1, 1, 1)).unwrap();
    assert_eq!(q.0, vec![1, 1]);
}

#[test]
fn chain_of_three() {
    let mut g = ScenarioGraph::new("chain");
    let a = g.add_actor("a");
    let b = g.add_actor("b");
    let c = g.add_actor("c");
    g.connect("ab", a, 3, b, 2, 0);
    g.connect("bc", b, 1, c, 3, 0);
    let q = BalanceEquations.compute(&g).unwrap();
    // 3 qa = 2 qb, qb = 3 qc
    assert_eq!(q.0, vec![2, 3, 1]);
}

#[test]
fn components_are_normalised_independently() {
    let mut g = ScenarioGraph::new("split");
    let a = g.add_actor("a");
    let b = g.add_actor("b");
    g.add_actor("lonely");
    g.connect("ab", a, 4, b, 2, 0);
    let q = BalanceEquations.compute(&g).unwrap();
    assert_eq!(q.get(a), 1);
    assert_eq!(q.get(b), 2);
    assert_eq!(q.get(ActorId(2)), 1);
}

#[test]
fn inconsistent_rates_fail() {
    let (mut g, a, b) = pair(1, 1, 1, 1);
    g.connect("ba", b, 2, a, 1, 1);
    assert!(matches!(
        BalanceEquations.compute(&g),
        Err(ModelError::Inconsistent { .. })
    ));
}

#[test]
fn large_rates_reduce_before_multiplying() {
    let big = 1u64 << 32;
    let mut g = ScenarioGraph::new("wide");
    let a = g.add_actor("a");
    let b = g.add_actor("b");
    let c = g.add_actor("c");
    g.connect("ab", a, big, b, 1, 0);
    g.connect("bc", b, big, c, big, 0);
    let q = BalanceEquations.compute(&g).unwrap();
    assert_eq!(q.0, vec![1, big, big]);
}

#[test]
fn vector_beyond_64_bits_is_an_error() {
    let big = 1u64 << 40;
    let mut g = ScenarioGraph::new("huge");
    let a = g.add_actor("a");
    let b = g.add_actor("b");
    let c = g.add_actor("c");
    g.connect("ab", a, big, b, 1, 0);
    g.connect("bc", b, big, c, 1, 0);
    assert!(matches!(
        BalanceEquations.compute(&g),
        Err(ModelError::RepetitionOverflow(name)) if name == "huge"
    ));
}

#[test]
fn self_loop_with_unequal_rates_is_inconsistent() {
    let mut g = ScenarioGraph::new("loop");
    let a = g.add_actor("a");
    g.connect("aa", a, 2, a, 1, 1);
    assert!(matches!(
        BalanceEquations.compute(&g),
        Err(ModelError::Inconsistent { .. })
    ));
}
