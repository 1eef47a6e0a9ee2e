use crate::atom::{Atom, Term};
use crate::bindings::{Bindings, BoundedAtom};
use crate::catalog::{Catalog, ObjectId, PredicateId};
use crate::dtg::{Dtg, NodeId, Transition};

/// A one-predicate logistics domain: trucks that can drive from l1 to l2.
///
/// `movers` restricts the drive action's truck parameter; a truck outside
/// it can sit at l1 but never leave.
pub(crate) struct TruckWorld {
    pub catalog: Catalog,
    pub bindings: Bindings,
    pub dtg: Dtg,
    pub at: PredicateId,
    pub l1: ObjectId,
    pub l2: ObjectId,
    pub node_at_l1: NodeId,
    pub node_at_l2: NodeId,
}

impl TruckWorld {
    pub fn object(&self, name: &str) -> ObjectId {
        self.catalog.object(name).unwrap()
    }

    pub fn initial_at(&mut self, who: ObjectId, location: ObjectId) -> BoundedAtom {
        self.bindings
            .ground(&self.catalog, self.at, &[who, location])
            .unwrap()
    }
}

pub(crate) fn truck_world(trucks: &[&str], movers: &[&str]) -> TruckWorld {
    let mut catalog = Catalog::new();
    catalog.add_type("object", None).unwrap();
    catalog.add_type("truck", Some("object")).unwrap();
    catalog.add_type("location", Some("object")).unwrap();
    for name in trucks {
        catalog.add_object(name, "truck").unwrap();
    }
    catalog.add_object("l1", "location").unwrap();
    catalog.add_object("l2", "location").unwrap();
    let at = catalog.add_predicate("at", &["truck", "location"]).unwrap();

    let l1 = catalog.object("l1").unwrap();
    let l2 = catalog.object("l2").unwrap();
    let mover_ids: Vec<ObjectId> = movers.iter().map(|m| catalog.object(m).unwrap()).collect();

    let mut bindings = Bindings::new(&catalog);
    let mut dtg = Dtg::new();

    // Action parameters, shared with the node atoms so that firing the
    // transition binds the to-node.
    let step = bindings.new_step();
    let d_truck = bindings.bind(step, 0, mover_ids);
    let d_from = bindings.bind(step, 1, vec![l1]);
    let d_to = bindings.bind(step, 2, vec![l2]);

    let step_l1 = bindings.new_step();
    bindings.bind_shared(step_l1, 0, d_truck);
    bindings.bind_shared(step_l1, 1, d_from);
    let node_at_l1 = dtg.add_node(
        vec![BoundedAtom::new(
            Atom::new(at, [Term::Variable(0), Term::Variable(1)]),
            step_l1,
        )],
        vec![Some(0)],
    );

    let step_l2 = bindings.new_step();
    bindings.bind_shared(step_l2, 0, d_truck);
    bindings.bind_shared(step_l2, 1, d_to);
    let node_at_l2 = dtg.add_node(
        vec![BoundedAtom::new(
            Atom::new(at, [Term::Variable(0), Term::Variable(1)]),
            step_l2,
        )],
        vec![Some(0)],
    );

    dtg.add_transition(Transition::new(
        node_at_l1,
        node_at_l2,
        step,
        vec![d_truck, d_from, d_to],
        vec![Atom::new(at, [Term::Variable(0), Term::Variable(1)])],
        Vec::new(),
    ));

    TruckWorld {
        catalog,
        bindings,
        dtg,
        at,
        l1,
        l2,
        node_at_l1,
        node_at_l2,
    }
}

/// A driverlog-style domain: a package rides a truck and is unloaded
/// wherever the truck happens to be. The unload transitions carry an
/// external dependency on the truck's location.
pub(crate) struct PackageWorld {
    pub catalog: Catalog,
    pub bindings: Bindings,
    pub dtg: Dtg,
    pub at: PredicateId,
    pub in_truck: PredicateId,
    pub truck: ObjectId,
    pub package: ObjectId,
    pub l1: ObjectId,
    pub l2: ObjectId,
    pub loaded_at_l1: NodeId,
    pub loaded_at_l2: NodeId,
    pub package_at_l1: NodeId,
    pub package_at_l2: NodeId,
}

pub(crate) fn package_world(with_drive: bool) -> PackageWorld {
    let mut catalog = Catalog::new();
    catalog.add_type("object", None).unwrap();
    catalog.add_type("locatable", Some("object")).unwrap();
    catalog.add_type("truck", Some("locatable")).unwrap();
    catalog.add_type("package", Some("locatable")).unwrap();
    catalog.add_type("location", Some("object")).unwrap();
    catalog.add_object("t1", "truck").unwrap();
    catalog.add_object("p1", "package").unwrap();
    catalog.add_object("l1", "location").unwrap();
    catalog.add_object("l2", "location").unwrap();
    let at = catalog
        .add_predicate("at", &["locatable", "location"])
        .unwrap();
    let in_truck = catalog.add_predicate("in", &["package", "truck"]).unwrap();

    let truck = catalog.object("t1").unwrap();
    let package = catalog.object("p1").unwrap();
    let l1 = catalog.object("l1").unwrap();
    let l2 = catalog.object("l2").unwrap();

    let mut bindings = Bindings::new(&catalog);
    let mut dtg = Dtg::new();

    // Truck property space: drive l1 -> l2.
    let drive_step = bindings.new_step();
    let d_mover = bindings.bind(drive_step, 0, vec![truck]);
    let d_drive_from = bindings.bind(drive_step, 1, vec![l1]);
    let d_drive_to = bindings.bind(drive_step, 2, vec![l2]);

    let step_t1 = bindings.new_step();
    bindings.bind_shared(step_t1, 0, d_mover);
    bindings.bind_shared(step_t1, 1, d_drive_from);
    let truck_at_l1 = dtg.add_node(
        vec![BoundedAtom::new(
            Atom::new(at, [Term::Variable(0), Term::Variable(1)]),
            step_t1,
        )],
        vec![Some(0)],
    );

    let step_t2 = bindings.new_step();
    bindings.bind_shared(step_t2, 0, d_mover);
    bindings.bind_shared(step_t2, 1, d_drive_to);
    let truck_at_l2 = dtg.add_node(
        vec![BoundedAtom::new(
            Atom::new(at, [Term::Variable(0), Term::Variable(1)]),
            step_t2,
        )],
        vec![Some(0)],
    );

    if with_drive {
        dtg.add_transition(Transition::new(
            truck_at_l1,
            truck_at_l2,
            drive_step,
            vec![d_mover, d_drive_from, d_drive_to],
            vec![Atom::new(at, [Term::Variable(0), Term::Variable(1)])],
            Vec::new(),
        ));
    }

    // Package property space. The unload from-nodes pair the package's
    // in-truck fact with the truck's position; the location domain is the
    // externally dependent parameter.
    let d_package = {
        let scratch = bindings.new_step();
        bindings.bind(scratch, 0, vec![package])
    };
    let d_carrier = {
        let scratch = bindings.new_step();
        bindings.bind(scratch, 0, vec![truck])
    };

    let loaded_node = |bindings: &mut Bindings, dtg: &mut Dtg, location: ObjectId| {
        let step = bindings.new_step();
        bindings.bind_shared(step, 0, d_package);
        bindings.bind_shared(step, 1, d_carrier);
        let d_location = bindings.bind(step, 2, vec![location]);
        let node = dtg.add_node(
            vec![
                BoundedAtom::new(
                    Atom::new(in_truck, [Term::Variable(0), Term::Variable(1)]),
                    step,
                ),
                BoundedAtom::new(
                    Atom::new(at, [Term::Variable(1), Term::Variable(2)]),
                    step,
                ),
            ],
            vec![Some(0), None],
        );
        (node, step, d_location)
    };

    let (loaded_at_l1, _, d_loc_l1) = loaded_node(&mut bindings, &mut dtg, l1);
    let (loaded_at_l2, _, d_loc_l2) = loaded_node(&mut bindings, &mut dtg, l2);

    let package_node = |bindings: &mut Bindings, dtg: &mut Dtg, d_location| {
        let step = bindings.new_step();
        bindings.bind_shared(step, 0, d_package);
        bindings.bind_shared(step, 1, d_location);
        dtg.add_node(
            vec![BoundedAtom::new(
                Atom::new(at, [Term::Variable(0), Term::Variable(1)]),
                step,
            )],
            vec![Some(0)],
        )
    };

    let package_at_l1 = package_node(&mut bindings, &mut dtg, d_loc_l1);
    let package_at_l2 = package_node(&mut bindings, &mut dtg, d_loc_l2);

    let unload = |bindings: &mut Bindings,
                  dtg: &mut Dtg,
                  from: NodeId,
                  to: NodeId,
                  d_location| {
        let step = bindings.new_step();
        bindings.bind_shared(step, 0, d_package);
        bindings.bind_shared(step, 1, d_carrier);
        bindings.bind_shared(step, 2, d_location);
        dtg.add_transition(Transition::new(
            from,
            to,
            step,
            vec![d_package, d_carrier, d_location],
            vec![
                Atom::new(in_truck, [Term::Variable(0), Term::Variable(1)]),
                Atom::new(at, [Term::Variable(1), Term::Variable(2)]),
            ],
            vec![d_location],
        ))
    };

    unload(&mut bindings, &mut dtg, loaded_at_l1, package_at_l1, d_loc_l1);
    unload(&mut bindings, &mut dtg, loaded_at_l2, package_at_l2, d_loc_l2);

    PackageWorld {
        catalog,
        bindings,
        dtg,
        at,
        in_truck,
        truck,
        package,
        l1,
        l2,
        loaded_at_l1,
        loaded_at_l2,
        package_at_l1,
        package_at_l2,
    }
}
