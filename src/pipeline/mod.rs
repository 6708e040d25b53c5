//! Render stages and the per-frame pass sequence.

pub mod frame_plan;
pub mod offscreen;
pub mod post_process;
pub mod scene_pass;
pub mod skybox;

pub use frame_plan::{DrawOp, FramePlan, PassPlan, Target};
pub use offscreen::{DEPTH_FORMAT, OffscreenTarget};
pub use post_process::{PostEffect, PostProcessStage, luminance};
pub use scene_pass::{Phase, ScenePass};
pub use skybox::Skybox;
