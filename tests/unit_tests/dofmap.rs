use galerkin::mesh::procedural::{create_unit_cube, create_unit_square};
use galerkin::{CellType, ElementDescription, FunctionSpace, Mesh};
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;

fn space(mesh: &Arc<Mesh<f64>>, description: ElementDescription) -> Arc<FunctionSpace<f64>> {
    FunctionSpace::build(mesh.clone(), description).unwrap()
}

/// `bs * sum_d (number of entities of dimension d) * (DOFs per entity of dimension d)`
fn expected_num_dofs(space: &FunctionSpace<f64>) -> usize {
    let topology = space.mesh().topology();
    let element = space.element();
    let nodes: usize = (0..=topology.dim())
        .map(|d| topology.num_entities(d) * element.entity_dofs(d, 0).len())
        .sum();
    space.block_size() * nodes
}

#[test]
fn dof_counts() {
    let triangles = Arc::new(create_unit_square(3, 2, CellType::Triangle).unwrap());
    let quads = Arc::new(create_unit_square(3, 2, CellType::Quadrilateral).unwrap());
    let tets = Arc::new(create_unit_cube(2, 1, 2, CellType::Tetrahedron).unwrap());
    let hexes = Arc::new(create_unit_cube(2, 1, 2, CellType::Hexahedron).unwrap());

    // 12 vertices, 23 edges for triangles (17 for quadrilaterals), 6 quadrilaterals
    let cases = [
        (space(&triangles, ElementDescription::lagrange(CellType::Triangle, 1)), 12),
        (space(&triangles, ElementDescription::lagrange(CellType::Triangle, 2)), 35),
        (
            space(&triangles, ElementDescription::lagrange(CellType::Triangle, 2).with_block_size(2)),
            70,
        ),
        (space(&triangles, ElementDescription::discontinuous_lagrange(CellType::Triangle, 1)), 36),
        (space(&quads, ElementDescription::lagrange(CellType::Quadrilateral, 2)), 35),
        (space(&quads, ElementDescription::discontinuous_lagrange(CellType::Quadrilateral, 0)), 6),
    ];
    for (space, expected) in &cases {
        assert_eq!(space.num_dofs(), *expected);
        assert_eq!(space.num_dofs(), expected_num_dofs(space));
    }

    for space in [
        space(&tets, ElementDescription::lagrange(CellType::Tetrahedron, 2).with_block_size(3)),
        space(&hexes, ElementDescription::lagrange(CellType::Hexahedron, 2)),
        space(&hexes, ElementDescription::discontinuous_lagrange(CellType::Hexahedron, 1)),
    ] {
        assert_eq!(space.num_dofs(), expected_num_dofs(&space));
    }
}

#[test]
fn dofs_on_shared_entities_are_shared() {
    let mesh = Arc::new(create_unit_cube(2, 2, 1, CellType::Tetrahedron).unwrap());
    let space = space(&mesh, ElementDescription::lagrange(CellType::Tetrahedron, 2));
    let topology = mesh.topology();

    for dim in [0, 1] {
        let mut entity_nodes: HashMap<usize, Vec<usize>> = HashMap::new();
        for cell in 0..mesh.num_cells() {
            let nodes = space.dofmap().cell_nodes(cell);
            for (local, &entity) in topology.cell_entities(cell, dim).iter().enumerate() {
                let entity_nodes_in_cell = space
                    .element()
                    .entity_dofs(dim, local)
                    .iter()
                    .map(|&local_dof| nodes[local_dof])
                    .collect_vec();
                let existing = entity_nodes
                    .entry(entity)
                    .or_insert_with(|| entity_nodes_in_cell.clone());
                assert_eq!(existing, &entity_nodes_in_cell);
            }
        }
    }
}

#[test]
fn numbering_is_deterministic() {
    let build = || {
        let mesh = Arc::new(create_unit_square(4, 4, CellType::Quadrilateral).unwrap());
        space(&mesh, ElementDescription::lagrange(CellType::Quadrilateral, 2))
    };
    let (a, b) = (build(), build());
    assert_eq!(a.dofmap(), b.dofmap());
}

#[test]
fn numbering_follows_first_encounter() {
    let mesh = Arc::new(create_unit_square(1, 1, CellType::Triangle).unwrap());
    let space = space(&mesh, ElementDescription::lagrange(CellType::Triangle, 2));
    let numbering = (0..mesh.num_cells())
        .map(|cell| format!("cell {}: {:?}", cell, space.dofmap().cell_nodes(cell)))
        .join("\n");
    insta::assert_snapshot!(numbering, @r###"
    cell 0: [0, 1, 2, 3, 4, 5]
    cell 1: [0, 6, 2, 7, 4, 8]
    "###);
}
