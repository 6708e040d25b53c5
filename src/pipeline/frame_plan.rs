//! The per-frame pass sequence.
//!
//! A [`FramePlan`] lists the render passes of one frame in submission order.
//! Each pass names its target and the draws it records. Building the plan is
//! pure, so the ordering rules can be checked without a GPU:
//!
//! - with post-processing on, the scene goes to the offscreen target and a
//!   second pass draws the post-process quad into the surface;
//! - with post-processing off, the scene goes straight to the surface and
//!   the offscreen target is not touched.
//!
//! Inside a scene pass the skybox comes first, then opaque meshes, then
//! transparent meshes.

/// Where a pass writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Offscreen,
    /// The window surface.
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOp {
    Skybox,
    Opaque,
    Transparent,
    PostProcess,
}

/// One render pass: a clear of `target` followed by `ops`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassPlan {
    pub target: Target,
    pub ops: Vec<DrawOp>,
}

impl PassPlan {
    /// Whether the pass needs a depth attachment.
    pub fn uses_depth(&self) -> bool {
        self.ops.iter().any(|op| *op != DrawOp::PostProcess)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePlan {
    pub passes: Vec<PassPlan>,
}

impl FramePlan {
    pub fn new(post_process_enabled: bool, has_transparent: bool) -> Self {
        let mut scene_ops = vec![DrawOp::Skybox, DrawOp::Opaque];
        if has_transparent {
            scene_ops.push(DrawOp::Transparent);
        }

        let passes = if post_process_enabled {
            vec![
                PassPlan {
                    target: Target::Offscreen,
                    ops: scene_ops,
                },
                PassPlan {
                    target: Target::Default,
                    ops: vec![DrawOp::PostProcess],
                },
            ]
        } else {
            vec![PassPlan {
                target: Target::Default,
                ops: scene_ops,
            }]
        };

        Self { passes }
    }

    /// True if any pass writes `target`.
    pub fn writes(&self, target: Target) -> bool {
        self.passes.iter().any(|pass| pass.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_process_renders_scene_offscreen_first() {
        let plan = FramePlan::new(true, true);
        assert_eq!(
            plan.passes,
            vec![
                PassPlan {
                    target: Target::Offscreen,
                    ops: vec![DrawOp::Skybox, DrawOp::Opaque, DrawOp::Transparent],
                },
                PassPlan {
                    target: Target::Default,
                    ops: vec![DrawOp::PostProcess],
                },
            ]
        );
        assert!(plan.passes[0].uses_depth());
        assert!(!plan.passes[1].uses_depth());
    }

    #[test]
    fn disabled_post_process_skips_offscreen() {
        let plan = FramePlan::new(false, false);
        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.passes[0].target, Target::Default);
        assert_eq!(plan.passes[0].ops, vec![DrawOp::Skybox, DrawOp::Opaque]);
        assert!(!plan.writes(Target::Offscreen));
        assert!(!plan.passes[0].ops.contains(&DrawOp::PostProcess));
    }

    #[test]
    fn transparent_phase_only_when_needed() {
        let plan = FramePlan::new(true, false);
        assert!(!plan.passes[0].ops.contains(&DrawOp::Transparent));
    }
}
