//! Arena-backed scene tree.

use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::error::SceneError;
use crate::mesh::Mesh;
use crate::texture::TextureId;

/// Handle to a node in a [`SceneGraph`].
///
/// Only meaningful for the graph that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the scene tree.
///
/// The local transform is only ever built from translate/rotate/scale
/// primitives, so it stays invertible.
#[derive(Debug)]
pub struct SceneNode<M = Mesh> {
    pub transform: Mat4,
    pub mesh: Option<Rc<M>>,
    pub texture: Option<TextureId>,
    /// 1.0 is opaque. Anything lower is drawn in the transparent phase.
    pub opacity: f32,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl<M> SceneNode<M> {
    fn new(mesh: Option<Rc<M>>) -> Self {
        Self {
            transform: Mat4::IDENTITY,
            mesh,
            texture: None,
            opacity: 1.0,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

/// A mesh to draw this frame with its composed transform.
#[derive(Debug)]
pub struct DrawItem<M = Mesh> {
    pub node: NodeId,
    pub mesh: Rc<M>,
    /// `parent_transform * ... * node.transform`
    pub transform: Mat4,
    pub texture: Option<TextureId>,
    pub opacity: f32,
}

impl<M> DrawItem<M> {
    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

/// A strict tree of [`SceneNode`]s rooted at [`SceneGraph::root`].
///
/// Nodes live in an arena and refer to each other by [`NodeId`]. New nodes
/// start detached; only nodes reachable from the root are visited. Dropping
/// the graph drops every node and releases its share of the meshes.
///
/// # Example
///
/// ```ignore
/// let mut scene = SceneGraph::new();
/// let pivot = scene.create_node();
/// let ship = scene.create_mesh_node(mesh.clone());
/// scene.add_child(scene.root(), pivot)?;
/// scene.add_child(pivot, ship)?;
/// scene.translate(ship, Vec3::new(3.0, 0.0, 0.0));
///
/// for item in scene.collect_draws(camera.view_matrix()) {
///     // item.transform = view * pivot * ship
/// }
/// ```
#[derive(Debug)]
pub struct SceneGraph<M = Mesh> {
    nodes: Vec<SceneNode<M>>,
}

impl<M> Default for SceneGraph<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SceneGraph<M> {
    pub fn new() -> Self {
        Self {
            nodes: vec![SceneNode::new(None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes including the root and detached nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn create_node(&mut self) -> NodeId {
        self.push(SceneNode::new(None))
    }

    pub fn create_mesh_node(&mut self, mesh: Rc<M>) -> NodeId {
        self.push(SceneNode::new(Some(mesh)))
    }

    fn push(&mut self, node: SceneNode<M>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode<M>> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode<M>> {
        self.nodes.get_mut(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn check(&self, id: NodeId) -> Result<(), SceneError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownNode(id))
        }
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// The child must be detached and must not be the root, `parent` itself
    /// or one of `parent`'s ancestors.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.check(parent)?;
        self.check(child)?;
        if child == self.root() {
            return Err(SceneError::RootAsChild);
        }
        if let Some(existing) = self.nodes[child.0].parent {
            return Err(SceneError::AlreadyParented {
                child,
                parent: existing,
            });
        }

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SceneError::Cycle { parent, child });
            }
            cursor = self.nodes[id.0].parent;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn set_mesh(&mut self, id: NodeId, mesh: Option<Rc<M>>) {
        if let Some(node) = self.node_mut(id) {
            node.mesh = mesh;
        }
    }

    pub fn set_texture(&mut self, id: NodeId, texture: Option<TextureId>) {
        if let Some(node) = self.node_mut(id) {
            node.texture = texture;
        }
    }

    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) {
        if let Some(node) = self.node_mut(id) {
            node.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    fn apply(&mut self, id: NodeId, primitive: Mat4) {
        if let Some(node) = self.node_mut(id) {
            node.transform *= primitive;
        }
    }

    /// Post-multiply a translation onto the local transform.
    pub fn translate(&mut self, id: NodeId, offset: Vec3) {
        self.apply(id, Mat4::from_translation(offset));
    }

    /// Post-multiply a rotation of `degrees` about `axis`.
    ///
    /// A zero axis leaves the transform unchanged.
    pub fn rotate(&mut self, id: NodeId, degrees: f32, axis: Vec3) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.apply(id, Mat4::from_axis_angle(axis, degrees.to_radians()));
    }

    /// Post-multiply a non-uniform scale.
    pub fn scale(&mut self, id: NodeId, factors: Vec3) {
        self.apply(id, Mat4::from_scale(factors));
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Mat4) {
        if let Some(node) = self.node_mut(id) {
            node.transform = transform;
        }
    }

    pub fn reset_transform(&mut self, id: NodeId) {
        self.set_transform(id, Mat4::IDENTITY);
    }

    /// Depth-first pre-order walk from the root.
    ///
    /// Siblings are visited in insertion order. `f` receives each node with
    /// its effective transform `parent_transform * ... * node.transform`.
    pub fn visit(&self, parent_transform: Mat4, mut f: impl FnMut(NodeId, &SceneNode<M>, Mat4)) {
        let mut stack = vec![(self.root(), parent_transform)];
        while let Some((id, parent)) = stack.pop() {
            let node = &self.nodes[id.0];
            let effective = parent * node.transform;
            f(id, node, effective);
            stack.extend(node.children.iter().rev().map(|&child| (child, effective)));
        }
    }

    /// Every reachable node that carries a mesh, in traversal order.
    pub fn collect_draws(&self, parent_transform: Mat4) -> Vec<DrawItem<M>> {
        let mut draws = Vec::new();
        self.visit(parent_transform, |id, node, transform| {
            if let Some(mesh) = &node.mesh {
                draws.push(DrawItem {
                    node: id,
                    mesh: Rc::clone(mesh),
                    transform,
                    texture: node.texture,
                    opacity: node.opacity,
                });
            }
        });
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn three_level_composition() {
        let mut scene: SceneGraph<&str> = SceneGraph::new();
        let a = scene.create_node();
        let b = scene.create_node();
        let c = scene.create_mesh_node(Rc::new("leaf"));
        scene.add_child(scene.root(), a).unwrap();
        scene.add_child(a, b).unwrap();
        scene.add_child(b, c).unwrap();

        scene.translate(a, Vec3::new(1.0, 0.0, 0.0));
        scene.rotate(b, 90.0, Vec3::Y);
        scene.scale(c, Vec3::splat(2.0));

        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let draws = scene.collect_draws(view);
        assert_eq!(draws.len(), 1);

        let expected = view
            * Mat4::from_translation(Vec3::X)
            * Mat4::from_rotation_y(90f32.to_radians())
            * Mat4::from_scale(Vec3::splat(2.0));
        assert!(approx(draws[0].transform, expected));
        assert_eq!(draws[0].node, c);
    }

    #[test]
    fn primitives_compound_in_call_order() {
        let mut scene: SceneGraph<()> = SceneGraph::new();
        let n = scene.create_node();
        scene.translate(n, Vec3::X);
        scene.scale(n, Vec3::splat(3.0));
        let t = scene.node(n).unwrap().transform;
        assert!(approx(t, Mat4::from_translation(Vec3::X) * Mat4::from_scale(Vec3::splat(3.0))));
        // Translation is applied first, so it is not scaled.
        assert_eq!(t.transform_point3(Vec3::ZERO), Vec3::X);

        scene.reset_transform(n);
        assert_eq!(scene.node(n).unwrap().transform, Mat4::IDENTITY);
    }

    #[test]
    fn visit_reaches_each_attached_node_once_in_pre_order() {
        let mut scene: SceneGraph<()> = SceneGraph::new();
        let root = scene.root();
        let a = scene.create_node();
        let b = scene.create_node();
        let a1 = scene.create_node();
        let a2 = scene.create_node();
        let detached = scene.create_node();
        scene.add_child(root, a).unwrap();
        scene.add_child(root, b).unwrap();
        scene.add_child(a, a1).unwrap();
        scene.add_child(a, a2).unwrap();

        let mut order = Vec::new();
        scene.visit(Mat4::IDENTITY, |id, _, _| order.push(id));
        assert_eq!(order, vec![root, a, a1, a2, b]);
        assert!(!order.contains(&detached));
        assert_eq!(scene.len(), 6);
    }

    #[test]
    fn shared_mesh_is_drawn_per_node() {
        let mut scene = SceneGraph::new();
        let mesh = Rc::new(42u32);
        let a = scene.create_mesh_node(Rc::clone(&mesh));
        let b = scene.create_mesh_node(Rc::clone(&mesh));
        scene.add_child(scene.root(), a).unwrap();
        scene.add_child(a, b).unwrap();
        scene.set_opacity(b, 0.5);

        let draws = scene.collect_draws(Mat4::IDENTITY);
        assert_eq!(draws.len(), 2);
        assert!(!draws[0].is_transparent());
        assert!(draws[1].is_transparent());
        assert_eq!(Rc::strong_count(&mesh), 5);

        drop(draws);
        drop(scene);
        assert_eq!(Rc::strong_count(&mesh), 1);
    }

    #[test]
    fn add_child_rejects_broken_trees() {
        let mut scene: SceneGraph<()> = SceneGraph::new();
        let root = scene.root();
        let a = scene.create_node();
        let b = scene.create_node();
        scene.add_child(root, a).unwrap();
        scene.add_child(a, b).unwrap();

        assert_eq!(scene.add_child(a, root), Err(SceneError::RootAsChild));
        assert_eq!(
            scene.add_child(root, b),
            Err(SceneError::AlreadyParented { child: b, parent: a })
        );

        let c = scene.create_node();
        assert_eq!(
            scene.add_child(c, c),
            Err(SceneError::Cycle { parent: c, child: c })
        );
        let d = scene.create_node();
        scene.add_child(c, d).unwrap();
        assert_eq!(
            scene.add_child(d, c),
            Err(SceneError::Cycle { parent: d, child: c })
        );

        let foreign = NodeId(99);
        assert_eq!(
            scene.add_child(root, foreign),
            Err(SceneError::UnknownNode(foreign))
        );
        assert_eq!(scene.parent(b), Some(a));
        assert_eq!(scene.children(a), &[b]);
    }

    #[test]
    fn empty_scene_has_nothing_to_draw() {
        let scene: SceneGraph<()> = SceneGraph::new();
        assert!(scene.is_empty());
        assert!(scene.collect_draws(Mat4::IDENTITY).is_empty());
        let mut visited = 0;
        scene.visit(Mat4::IDENTITY, |_, _, _| visited += 1);
        assert_eq!(visited, 1);
    }
}
