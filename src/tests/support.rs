use crate::atom::{Atom, Term};
use crate::bindings::{Bindings, BoundedAtom};
use crate::catalog::{Catalog, ObjectId};
use crate::support::{find_supports, Assignment};

struct Setup {
    catalog: Catalog,
    bindings: Bindings,
    t1: ObjectId,
    t2: ObjectId,
    l1: ObjectId,
    l2: ObjectId,
    at: crate::catalog::PredicateId,
}

fn setup() -> Setup {
    let mut catalog = Catalog::new();
    catalog.add_type("object", None).unwrap();
    catalog.add_type("truck", Some("object")).unwrap();
    catalog.add_type("location", Some("object")).unwrap();
    catalog.add_object("t1", "truck").unwrap();
    catalog.add_object("t2", "truck").unwrap();
    catalog.add_object("l1", "location").unwrap();
    catalog.add_object("l2", "location").unwrap();
    let at = catalog.add_predicate("at", &["truck", "location"]).unwrap();
    let bindings = Bindings::new(&catalog);
    Setup {
        t1: catalog.object("t1").unwrap(),
        t2: catalog.object("t2").unwrap(),
        l1: catalog.object("l1").unwrap(),
        l2: catalog.object("l2").unwrap(),
        at,
        catalog,
        bindings,
    }
}

/// Two goal atoms sharing the truck variable; the location variables are
/// independent.
fn shared_truck_goals(s: &mut Setup) -> Vec<BoundedAtom> {
    let step = s.bindings.new_step();
    s.bindings.bind(step, 0, vec![s.t1, s.t2]);
    s.bindings.bind(step, 1, vec![s.l1, s.l2]);
    s.bindings.bind(step, 2, vec![s.l1, s.l2]);
    vec![
        BoundedAtom::new(Atom::new(s.at, [Term::Variable(0), Term::Variable(1)]), step),
        BoundedAtom::new(Atom::new(s.at, [Term::Variable(0), Term::Variable(2)]), step),
    ]
}

fn ground_facts(s: &mut Setup) -> Vec<BoundedAtom> {
    let f1 = s.bindings.ground(&s.catalog, s.at, &[s.t1, s.l1]).unwrap();
    let f2 = s.bindings.ground(&s.catalog, s.at, &[s.t2, s.l2]).unwrap();
    vec![f1, f2]
}

#[test]
fn single_goal_yields_one_tuple_per_unifiable_fact() {
    let mut s = setup();
    let step = s.bindings.new_step();
    s.bindings.bind(step, 0, vec![s.t1, s.t2]);
    s.bindings.bind(step, 1, vec![s.l1, s.l2]);
    let goal = vec![BoundedAtom::new(
        Atom::new(s.at, [Term::Variable(0), Term::Variable(1)]),
        step,
    )];
    let facts = ground_facts(&mut s);

    let tuples = find_supports(&goal, &Assignment::default(), &facts, &mut s.bindings);
    assert_eq!(tuples.len(), 2);
}

#[test]
fn shared_variable_domains_are_intersected_across_goals() {
    let mut s = setup();
    let goals = shared_truck_goals(&mut s);
    let facts = ground_facts(&mut s);

    let tuples = find_supports(&goals, &Assignment::default(), &facts, &mut s.bindings);

    // The shared truck variable forces both atoms onto the same truck, so
    // only (t1,l1)+(t1,l1) and (t2,l2)+(t2,l2) survive.
    assert_eq!(tuples.len(), 2);
    for tuple in &tuples {
        assert_eq!(tuple.len(), 2);
        let first = s
            .bindings
            .term_domain(tuple[0].atom.terms[0], tuple[0].step)
            .unwrap();
        let second = s
            .bindings
            .term_domain(tuple[1].atom.terms[0], tuple[1].step)
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }
}

#[test]
fn empty_intersection_backtracks_without_a_tuple() {
    let mut s = setup();
    let step = s.bindings.new_step();
    s.bindings.bind(step, 0, vec![s.t2]);
    s.bindings.bind(step, 1, vec![s.l1, s.l2]);
    let goal = vec![BoundedAtom::new(
        Atom::new(s.at, [Term::Variable(0), Term::Variable(1)]),
        step,
    )];
    let only_t1 = vec![s.bindings.ground(&s.catalog, s.at, &[s.t1, s.l1]).unwrap()];

    let tuples = find_supports(&goal, &Assignment::default(), &only_t1, &mut s.bindings);
    assert!(tuples.is_empty());
}

#[test]
fn seed_assignment_narrows_the_search() {
    let mut s = setup();
    let goals = shared_truck_goals(&mut s);
    let facts = ground_facts(&mut s);

    let truck_domain = s
        .bindings
        .term_domain_id(goals[0].atom.terms[0], goals[0].step)
        .unwrap();
    let mut seed = Assignment::default();
    seed.insert(truck_domain, vec![s.t2]);

    let tuples = find_supports(&goals, &seed, &facts, &mut s.bindings);
    assert_eq!(tuples.len(), 1);
    let trucks = s
        .bindings
        .term_domain(tuples[0][0].atom.terms[0], tuples[0][0].step)
        .unwrap();
    assert_eq!(trucks, &[s.t2]);
}

#[test]
fn synthesized_tuples_do_not_alias_goal_domains() {
    let mut s = setup();
    let goals = shared_truck_goals(&mut s);
    let facts = ground_facts(&mut s);

    let tuples = find_supports(&goals, &Assignment::default(), &facts, &mut s.bindings);
    assert!(!tuples.is_empty());

    // The goal atoms keep their wide domains after the search.
    let goal_trucks = s
        .bindings
        .term_domain(goals[0].atom.terms[0], goals[0].step)
        .unwrap();
    assert_eq!(goal_trucks, &[s.t1, s.t2]);
}

#[test]
fn object_terms_in_goals_pin_the_candidate() {
    let mut s = setup();
    let step = s.bindings.new_step();
    s.bindings.bind(step, 1, vec![s.l1, s.l2]);
    let goal = vec![BoundedAtom::new(
        Atom::new(s.at, [Term::Object(s.t2), Term::Variable(1)]),
        step,
    )];
    let facts = ground_facts(&mut s);

    let tuples = find_supports(&goal, &Assignment::default(), &facts, &mut s.bindings);
    assert_eq!(tuples.len(), 1);
    let locations = s
        .bindings
        .term_domain(tuples[0][0].atom.terms[1], tuples[0][0].step)
        .unwrap();
    assert_eq!(locations, &[s.l2]);
}

#[test]
fn empty_goal_list_is_trivially_supported() {
    let mut s = setup();
    let facts = ground_facts(&mut s);
    let tuples = find_supports(&[], &Assignment::default(), &facts, &mut s.bindings);
    assert_eq!(tuples.len(), 1);
    assert!(tuples[0].is_empty());
}
