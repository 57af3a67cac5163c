use std::rc::Rc;

use shaderpass::{
    Command, CommandLog, Destination, FilterMode, HeadlessBackend, PassChain, PassError,
    PassOptions, RenderBuffer, RenderContext, RenderOptions, RenderPass, SharedProducer, Size,
    TargetSize, Uniform, UniformValue, shared,
};

const FRAGMENT: &str = "@fragment fn fs() -> @location(0) vec4f { return vec4f(1.0); }";

fn context(width: u32, height: u32) -> (RenderContext, CommandLog) {
    let (backend, log) = HeadlessBackend::new(Size::new(width, height));
    (RenderContext::new(backend), log)
}

fn pass(ctx: &mut RenderContext, label: &str, options: PassOptions) -> RenderPass {
    RenderPass::new(
        ctx,
        label,
        FRAGMENT,
        [Uniform::new("gain", 1.0f32), Uniform::texture("input")],
        options,
    )
    .expect("pass")
}

fn labels(chain: &PassChain) -> Vec<String> {
    chain
        .passes()
        .iter()
        .map(|p| p.borrow().label().to_string())
        .collect()
}

#[test]
fn double_buffered_output_is_never_the_write_target() {
    let (mut ctx, log) = context(32, 32);
    let mut feedback = pass(&mut ctx, "feedback", PassOptions::new().double_buffer(true));

    for _ in 0..5 {
        feedback.render(&mut ctx, &RenderOptions::new()).unwrap();
        let output = feedback.output_texture().unwrap();
        assert_ne!(output, feedback.current_buffer().unwrap().texture());
        assert_eq!(
            feedback.uniform("back_buffer").unwrap(),
            &UniformValue::Texture(Some(output))
        );
    }

    // Every draw wrote the buffer that the next render samples.
    let draws = log.draws();
    for pair in draws.windows(2) {
        let Destination::Target { id, .. } = pair[0].destination else {
            panic!("expected an offscreen draw");
        };
        assert_eq!(pair[1].textures[0], Some(shaderpass::TextureHandle(id.0)));
    }
}

#[test]
fn override_destination_leaves_buffers_alone() {
    let (mut ctx, log) = context(32, 32);
    let mut feedback = pass(&mut ctx, "feedback", PassOptions::new().double_buffer(true));
    let target = RenderBuffer::new(&mut ctx, TargetSize::Fixed(Size::new(8, 4))).unwrap();

    feedback.render(&mut ctx, &RenderOptions::new()).unwrap();
    let before = feedback.output_texture().unwrap();

    feedback
        .render(&mut ctx, &RenderOptions::new().destination(target.destination()))
        .unwrap();

    assert_eq!(feedback.output_texture().unwrap(), before);
    let draw = log.draws().pop().unwrap();
    assert_eq!(draw.destination, target.destination());
    assert_eq!((draw.float_at(0), draw.float_at(4)), (8.0, 4.0));
}

#[test]
fn linked_pass_samples_upstream_output() {
    let (mut ctx, log) = context(16, 16);
    let upstream = shared(pass(&mut ctx, "upstream", PassOptions::new().double_buffer(true)));
    let source: SharedProducer = upstream.clone();
    let mut downstream = pass(&mut ctx, "downstream", PassOptions::new());
    downstream.link_pass_to_uniform(&source, "input").unwrap();

    upstream
        .borrow_mut()
        .render(&mut ctx, &RenderOptions::new())
        .unwrap();
    downstream.render(&mut ctx, &RenderOptions::new()).unwrap();

    let expected = upstream.borrow().output_texture().unwrap();
    let draw = log.draws().pop().unwrap();
    assert_eq!(draw.label, "downstream");
    assert_eq!(draw.textures, vec![Some(expected)]);
}

#[test]
fn dropped_link_source_is_reported() {
    let (mut ctx, _) = context(16, 16);
    let mut downstream = pass(&mut ctx, "downstream", PassOptions::new());
    {
        let upstream: SharedProducer = shared(pass(&mut ctx, "upstream", PassOptions::new()));
        downstream.link_pass_to_uniform(&upstream, "input").unwrap();
    }

    assert!(matches!(
        downstream.render(&mut ctx, &RenderOptions::new()),
        Err(PassError::LinkSourceDropped(name)) if name == "input"
    ));
}

#[test]
fn removing_an_update_function_stops_it() {
    let (mut ctx, _) = context(16, 16);
    let mut p = pass(&mut ctx, "p", PassOptions::new());
    let id = p.add_update_function(|program| program.set_uniform("gain", 3.0f32));

    p.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(p.uniform("gain").unwrap(), &UniformValue::Float(3.0));

    assert!(p.remove_update_function(id));
    assert!(!p.remove_update_function(id));
    p.set_uniform("gain", 0.5f32).unwrap();
    p.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(p.uniform("gain").unwrap(), &UniformValue::Float(0.5));
}

#[test]
fn wrong_uniform_type_is_a_configuration_error() {
    let (mut ctx, _) = context(16, 16);
    let mut p = pass(&mut ctx, "p", PassOptions::new());
    let err = p.set_uniform("gain", [1.0f32, 2.0]).unwrap_err();
    assert!(matches!(err, PassError::UniformTypeMismatch { .. }));
    assert!(err.is_configuration());
}

#[test]
fn surface_tracking_pass_rebuilds_after_resize() {
    let (mut ctx, log) = context(64, 32);
    let mut tracking = pass(&mut ctx, "tracking", PassOptions::new().double_buffer(true));
    let mut fixed = pass(&mut ctx, "fixed", PassOptions::new().size(10, 10));
    tracking.render(&mut ctx, &RenderOptions::new()).unwrap();
    fixed.render(&mut ctx, &RenderOptions::new()).unwrap();
    log.take();

    ctx.resize_surface(Size::new(128, 96));
    tracking.render(&mut ctx, &RenderOptions::new()).unwrap();
    fixed.render(&mut ctx, &RenderOptions::new()).unwrap();

    assert_eq!(tracking.size(), Size::new(128, 96));
    assert_eq!(fixed.size(), Size::new(10, 10));
    assert_eq!(log.count(|c| matches!(c, Command::DestroyTarget(_))), 2);
    assert_eq!(log.count(|c| matches!(c, Command::CreateTarget { .. })), 2);

    let draws = log.draws();
    assert_eq!((draws[0].float_at(0), draws[0].float_at(4)), (128.0, 96.0));
    assert_eq!((draws[0].float_at(8), draws[0].float_at(12)), (128.0, 96.0));
    assert_eq!((draws[1].float_at(0), draws[1].float_at(4)), (10.0, 10.0));
}

#[test]
fn explicit_resize_switches_to_a_fixed_size() {
    let (mut ctx, _) = context(64, 32);
    let mut p = pass(&mut ctx, "p", PassOptions::new().double_buffer(true));
    p.resize(&mut ctx, 20, 10).unwrap();
    assert_eq!(p.size(), Size::new(20, 10));
    assert_eq!(p.uniform("resolution").unwrap(), &UniformValue::Vec2([20.0, 10.0]));

    ctx.resize_surface(Size::new(200, 200));
    p.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(p.size(), Size::new(20, 10));
}

#[test]
fn program_cache_skips_redundant_binds() {
    let (mut ctx, log) = context(16, 16);
    let mut a = pass(&mut ctx, "a", PassOptions::new());
    let mut b = pass(&mut ctx, "b", PassOptions::new());

    a.render(&mut ctx, &RenderOptions::new()).unwrap();
    a.render(&mut ctx, &RenderOptions::new()).unwrap();
    b.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(log.count(|c| matches!(c, Command::UseProgram(_))), 2);
    assert_eq!(ctx.bound_program(), Some(b.program().id()));

    b.dispose(&mut ctx);
    assert_eq!(ctx.bound_program(), None);

    ctx.invalidate_program_cache();
    a.render(&mut ctx, &RenderOptions::new()).unwrap();
    a.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(log.count(|c| matches!(c, Command::UseProgram(_))), 3);
}

#[test]
fn unchanged_uniforms_are_not_reuploaded() {
    let (mut ctx, log) = context(16, 16);
    let mut p = pass(&mut ctx, "p", PassOptions::new());
    p.render(&mut ctx, &RenderOptions::new()).unwrap();
    let uploads = log.count(|c| matches!(c, Command::Upload { .. }));

    p.set_uniform("gain", 1.0f32).unwrap();
    p.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(log.count(|c| matches!(c, Command::Upload { .. })), uploads);

    p.set_uniform("gain", 2.0f32).unwrap();
    p.render(&mut ctx, &RenderOptions::new()).unwrap();
    assert_eq!(log.count(|c| matches!(c, Command::Upload { .. })), uploads + 1);
}

#[test]
fn screen_blit_uses_screen_blend_and_restores_filter() {
    use shaderpass::BlendMode;

    let (mut ctx, log) = context(16, 16);
    let mut p = pass(&mut ctx, "p", PassOptions::new());
    let output = p.output_texture().unwrap();
    p.set_buffer_filter(&mut ctx, FilterMode::Nearest).unwrap();

    p.render(
        &mut ctx,
        &RenderOptions::to_screen()
            .blend(BlendMode::Multiply)
            .screen_blend(BlendMode::Add)
            .linear_filter(true)
            .clear(true),
    )
    .unwrap();

    let draws = log.draws();
    assert_eq!(draws.len(), 2);
    // The offscreen draw does not blend when the result goes to the screen.
    assert_eq!(draws[0].blend, None);
    assert_eq!(draws[1].destination, Destination::Screen);
    assert_eq!(draws[1].blend, BlendMode::Add.state());
    assert_eq!(ctx.backend().mag_filter(output).unwrap(), FilterMode::Nearest);
    assert!(log.commands().contains(&Command::Clear {
        destination: Destination::Screen,
        color: shaderpass::Color::BLACK,
    }));
}

#[test]
fn chain_renders_in_order_and_only_the_terminal_reaches_the_screen() {
    let (mut ctx, log) = context(16, 16);
    let a: SharedProducer = shared(pass(&mut ctx, "a", PassOptions::new()));
    let b: SharedProducer = shared(pass(&mut ctx, "b", PassOptions::new()));
    let out: SharedProducer = shared(pass(&mut ctx, "out", PassOptions::new()));
    let mut chain = PassChain::new(out.clone(), [a.clone(), b.clone(), a.clone()]);
    assert_eq!(labels(&chain), ["a", "b", "out"]);

    chain.render(&mut ctx, &RenderOptions::to_screen()).unwrap();

    let draws: Vec<_> = log
        .draws()
        .into_iter()
        .map(|d| (d.label, d.destination == Destination::Screen))
        .collect();
    assert_eq!(
        draws,
        [
            ("a".to_string(), false),
            ("b".to_string(), false),
            ("out".to_string(), false),
            ("copy to screen".to_string(), true),
        ]
    );
    assert_eq!(
        chain.output_texture().unwrap(),
        out.borrow().output_texture().unwrap()
    );
}

#[test]
fn chain_member_pinned_to_the_screen_keeps_its_output() {
    let (mut ctx, log) = context(16, 16);
    let preview: SharedProducer = shared(pass(
        &mut ctx,
        "preview",
        PassOptions::new().render(RenderOptions::to_screen()),
    ));
    let out: SharedProducer = shared(pass(&mut ctx, "out", PassOptions::new()));
    let mut chain = PassChain::new(out, [preview]);

    chain.render(&mut ctx, &RenderOptions::new()).unwrap();

    let screen_draws = log
        .draws()
        .iter()
        .filter(|d| d.destination == Destination::Screen)
        .count();
    assert_eq!(screen_draws, 1);
}

#[test]
fn chain_render_to_leaves_terminal_output_unchanged() {
    let (mut ctx, log) = context(16, 16);
    let a: SharedProducer = shared(pass(&mut ctx, "a", PassOptions::new()));
    let out = shared(pass(&mut ctx, "out", PassOptions::new().double_buffer(true)));
    let mut chain = PassChain::new(out.clone(), [a]);
    let target = RenderBuffer::new(&mut ctx, TargetSize::Surface).unwrap();

    chain.render(&mut ctx, &RenderOptions::new()).unwrap();
    let steady = chain.output_texture().unwrap();
    log.take();

    chain
        .render_to(&mut ctx, target.destination(), &RenderOptions::to_screen())
        .unwrap();

    assert_eq!(chain.output_texture().unwrap(), steady);
    let draws = log.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[1].label, "out");
    assert_eq!(draws[1].destination, target.destination());
}

#[test]
fn add_then_remove_restores_the_chain() {
    let (mut ctx, _) = context(16, 16);
    let a: SharedProducer = shared(pass(&mut ctx, "a", PassOptions::new()));
    let b: SharedProducer = shared(pass(&mut ctx, "b", PassOptions::new()));
    let c: SharedProducer = shared(pass(&mut ctx, "c", PassOptions::new()));
    let out: SharedProducer = shared(pass(&mut ctx, "out", PassOptions::new()));
    let mut chain = PassChain::new(out.clone(), [a.clone()]);

    chain.add_passes([b.clone(), c.clone(), b.clone()]);
    assert_eq!(labels(&chain), ["a", "out", "b", "c"]);

    chain.remove_passes(&[b, c]).unwrap();
    assert_eq!(labels(&chain), ["a", "out"]);
    assert!(Rc::ptr_eq(chain.terminal(), &out));
}

#[test]
fn removing_the_terminal_is_rejected() {
    let (mut ctx, _) = context(16, 16);
    let a: SharedProducer = shared(pass(&mut ctx, "a", PassOptions::new()));
    let out: SharedProducer = shared(pass(&mut ctx, "out", PassOptions::new()));
    let mut chain = PassChain::new(out.clone(), [a.clone()]);

    let err = chain.remove_passes(&[a, out.clone()]).unwrap_err();
    assert!(matches!(err, PassError::TerminalRemoval));
    assert_eq!(labels(&chain), ["a", "out"]);

    let next: SharedProducer = shared(pass(&mut ctx, "next", PassOptions::new()));
    chain.set_terminal(next.clone());
    chain.remove_passes(&[out]).unwrap();
    assert_eq!(labels(&chain), ["a", "next"]);
}

#[test]
fn a_pass_cannot_sample_itself_reentrantly() {
    let (mut ctx, _) = context(16, 16);
    let looped = shared(pass(&mut ctx, "loop", PassOptions::new()));
    let source: SharedProducer = looped.clone();
    looped
        .borrow_mut()
        .link_pass_to_uniform(&source, "input")
        .unwrap();

    let mut chain = PassChain::new(source, Vec::new());
    assert!(matches!(
        chain.render(&mut ctx, &RenderOptions::new()),
        Err(PassError::ProducerBusy)
    ));
}

#[test]
fn chain_dispose_releases_every_member() {
    let (mut ctx, log) = context(16, 16);
    let a: SharedProducer = shared(pass(&mut ctx, "a", PassOptions::new()));
    let out: SharedProducer = shared(pass(&mut ctx, "out", PassOptions::new()));
    let mut chain = PassChain::new(out, [a]);

    chain.dispose(&mut ctx);
    chain.dispose(&mut ctx);
    assert_eq!(log.count(|c| matches!(c, Command::DeleteProgram(_))), 2);
    assert!(matches!(chain.output_texture(), Err(PassError::Disposed(_))));
}
