//! Scene graph traversal.
//!
//! Walks the imported node hierarchy depth-first with an explicit worklist, composing
//! `world = parent_world * local` at every node. The walk is planned first and only then
//! are meshes built, so a malformed graph fails before any GPU buffer exists.

use anyhow::{anyhow, bail};
use cgmath::{Matrix4, SquareMatrix};

use crate::{
    context::BufferAllocator,
    data_structures::{
        model::Mesh,
        scene::{Scene, SourceMesh},
    },
    resources::mesh::GeometryBuilder,
};

/// A mesh reference reached during traversal together with its accumulated transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub mesh: usize,
    pub world: Matrix4<f32>,
}

/**
 * Orders every mesh reference of the scene as it will appear in the model.
 *
 * A node's own meshes come before its children, children in source order. Reaching a node
 * twice (a cycle, or a child shared between parents) is an error, as is any dangling index
 * or a face index past the end of its mesh's vertex list.
 */
pub fn plan(scene: &Scene) -> anyhow::Result<Vec<MeshInstance>> {
    if scene.root_node().is_none() {
        bail!("scene has no root node");
    }
    let mut visited = vec![false; scene.nodes.len()];
    let mut instances = Vec::new();
    let mut worklist = vec![(scene.root, Matrix4::identity())];

    while let Some((idx, parent_world)) = worklist.pop() {
        let node = scene
            .nodes
            .get(idx)
            .ok_or_else(|| anyhow!("node index {idx} out of range ({} nodes)", scene.nodes.len()))?;
        if std::mem::replace(&mut visited[idx], true) {
            bail!("node {idx} '{}' is reached twice; the node graph is not a tree", node.name);
        }

        let world = parent_world * node.transform;
        for &mesh in &node.meshes {
            if mesh >= scene.meshes.len() {
                bail!(
                    "node {idx} '{}' references mesh {mesh}, but the scene has {} meshes",
                    node.name,
                    scene.meshes.len()
                );
            }
            validate_indices(&scene.meshes[mesh])?;
            instances.push(MeshInstance { mesh, world });
        }
        // reversed so the first child is popped first
        for &child in node.children.iter().rev() {
            worklist.push((child, world));
        }
    }
    Ok(instances)
}

/// Fails if any face index is not below the mesh's vertex count.
pub fn validate_indices(mesh: &SourceMesh) -> anyhow::Result<()> {
    let vertex_count = mesh.positions.len();
    if let Some(&bad) = mesh.faces.iter().flatten().find(|&&i| i as usize >= vertex_count) {
        bail!(
            "mesh '{}' has index {} but only {} vertices",
            mesh.name,
            bad,
            vertex_count
        );
    }
    Ok(())
}

/// Builds every planned mesh and appends it to `out`.
pub fn traverse<A>(
    scene: &Scene,
    builder: &mut GeometryBuilder<'_, A>,
    out: &mut Vec<Mesh<A::Buffer>>,
) -> anyhow::Result<()>
where
    A: BufferAllocator + ?Sized,
{
    let instances = plan(scene)?;
    out.reserve(instances.len());
    for instance in instances {
        out.push(builder.build(&scene.meshes[instance.mesh], &instance.world));
    }
    Ok(())
}
