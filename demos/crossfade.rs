//! Controller demo - cycles between two scenes with timed transitions.
//!
//! This example shows:
//! - A single pass ("plasma") and a chain ("trails") registered as controller scenes
//! - A double-buffered pass reading its own previous frame through `back_buffer`
//! - Linking one pass's output into another's texture uniform
//! - The built-in crossfade alongside a custom wipe transition
//!
//! Run with `RUST_LOG=shaderpass=debug` to watch transitions start and finish.

use shaderpass::{
    AppConfig, CROSSFADE, Frame, Interpolation, PassChain, PassController, PassOptions,
    PassResult, RenderOptions, RenderPass, SharedProducer, Uniform, run_with_config, shared,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SCENES: [&str; 2] = ["trails", "plasma"];
const TRANSITIONS: [&str; 2] = [CROSSFADE, "wipe"];
const HOLD: f32 = 4.0;
const TRANSITION_SECONDS: f64 = 1.5;

fn main() -> PassResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    run_with_config(
        AppConfig::new().title("Crossfade Demo").size(1280, 720),
        |ctx| {
            let plasma = shared(RenderPass::new(
                ctx,
                "plasma",
                include_str!("plasma.wgsl"),
                [Uniform::new("time", 0.0f32)],
                PassOptions::new(),
            )?);
            let source: SharedProducer = plasma.clone();

            let trails = shared(RenderPass::new(
                ctx,
                "trails",
                include_str!("trails.wgsl"),
                [Uniform::new("decay", 0.96f32), Uniform::texture("source")],
                PassOptions::new().double_buffer(true),
            )?);
            trails.borrow_mut().link_pass_to_uniform(&source, "source")?;
            let chain: SharedProducer = shared(PassChain::new(trails, [source.clone()]));

            let mut controller =
                PassController::new(ctx, [("plasma", source), ("trails", chain)])?;
            controller.add_transition(ctx, "wipe", include_str!("wipe.wgsl"))?;

            let mut next_switch = HOLD;
            let mut index = 0;

            Ok(move |frame: &mut Frame| {
                plasma.borrow_mut().set_uniform("time", frame.time)?;

                if frame.time >= next_switch {
                    let scene = SCENES[index % SCENES.len()];
                    let transition = TRANSITIONS[index % TRANSITIONS.len()];
                    info!(scene, transition, fps = frame.fps(), "switching scene");
                    controller.transition_to(
                        frame.ctx,
                        scene,
                        TRANSITION_SECONDS,
                        transition,
                        Interpolation::EaseInOut,
                    )?;
                    index += 1;
                    next_switch += HOLD;
                }

                controller.render(frame.ctx, &RenderOptions::new())
            })
        },
    )
}
