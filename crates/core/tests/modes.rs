//! Block nesting as seen through the context API.

use rib_core::call::Call;
use rib_core::mode::ModeBits;
use rib_core::{Context, Dispatch, ErrorCode, HandlerKind, Mode, Options, Recorder, Request};

fn context() -> Context<Recorder> {
    let options = Options {
        error_handler: HandlerKind::Collect,
        ..Options::default()
    };
    Context::with_options(options, Recorder::new()).unwrap()
}

fn sphere() -> Call {
    Call::Sphere {
        radius: 1.0,
        zmin: -1.0,
        zmax: 1.0,
        thetamax: 360.0,
    }
}

fn accept(ctx: &mut Context<Recorder>, call: Call) {
    let request = call.request();
    assert_eq!(
        ctx.call(call, &[], 0).unwrap(),
        Dispatch::Accepted,
        "{} was rejected: {:?}",
        request,
        ctx.diagnostics()
    );
}

#[test]
fn frame_world_sequence_returns_outside() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::FrameBegin { frame: 1 });
    accept(&mut ctx, Call::WorldBegin);
    accept(&mut ctx, sphere());
    accept(&mut ctx, Call::WorldEnd);
    accept(&mut ctx, Call::FrameEnd);
    assert!(ctx.end().unwrap().is_accepted());
    assert!(ctx.modes().is_empty());
    assert_eq!(ctx.current_mode(), Mode::Outside);
    assert_eq!(ctx.error_count(), 0);
    assert_eq!(
        ctx.sink().requests(),
        vec![
            Request::Begin,
            Request::FrameBegin,
            Request::WorldBegin,
            Request::Sphere,
            Request::WorldEnd,
            Request::FrameEnd,
            Request::End,
        ]
    );
}

#[test]
fn geometry_outside_world_is_rejected() {
    let mut ctx = context();
    ctx.begin().unwrap();
    assert_eq!(ctx.call(sphere(), &[], 3).unwrap(), Dispatch::Rejected);
    assert_eq!(ctx.modes().depth(), 1);
    assert_eq!(ctx.current_mode(), Mode::Begin);
    let d = &ctx.diagnostics()[0];
    assert_eq!(d.code, ErrorCode::State);
    assert!(d.message.contains("line 3"));
    assert_eq!(ctx.sink().calls.len(), 1);
}

#[test]
fn resource_scope_inherits_attribute_bits() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::WorldBegin);
    accept(&mut ctx, Call::AttributeBegin);
    accept(&mut ctx, Call::ResourceBegin);
    assert!(ctx.modes().accepts(ModeBits::ATTRIBUTE));
    assert!(!ctx.modes().accepts(ModeBits::WORLD));

    accept(&mut ctx, sphere());
    accept(&mut ctx, Call::Surface { shader: "matte".into() });
    // legal only directly in the world block
    assert_eq!(ctx.call(Call::WorldEnd, &[], 0).unwrap(), Dispatch::Rejected);
    assert_eq!(ctx.current_mode(), Mode::Resource);

    accept(&mut ctx, Call::ResourceEnd);
    accept(&mut ctx, Call::AttributeEnd);
    accept(&mut ctx, Call::WorldEnd);
}

#[test]
fn area_light_closes_with_attribute_scope() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::WorldBegin);
    accept(&mut ctx, Call::AttributeBegin);
    let handle = ctx.new_handle();
    accept(
        &mut ctx,
        Call::AreaLightSource {
            shader: "arealight".into(),
            handle,
        },
    );
    accept(&mut ctx, sphere());
    assert_eq!(ctx.modes().open_area_light(), Some(handle));
    accept(&mut ctx, Call::AttributeEnd);
    assert_eq!(ctx.modes().open_area_light(), None);
    assert_eq!(ctx.sink().closed_area_lights, vec![handle]);
}

#[test]
fn second_area_light_closes_the_first() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::WorldBegin);
    let first = ctx.new_handle();
    let second = ctx.new_handle();
    for handle in [first, second] {
        accept(
            &mut ctx,
            Call::AreaLightSource {
                shader: "arealight".into(),
                handle,
            },
        );
    }
    assert_eq!(ctx.sink().closed_area_lights, vec![first]);
    ctx.end().unwrap();
    assert_eq!(ctx.sink().closed_area_lights, vec![first, second]);
}

#[test]
fn conditional_chain() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::WorldBegin);
    accept(&mut ctx, Call::IfBegin { condition: "$user:pass == 1".into() });
    accept(&mut ctx, sphere());
    accept(&mut ctx, Call::ElseIf { condition: "$user:pass == 2".into() });
    accept(&mut ctx, Call::Else);
    assert_eq!(ctx.current_mode(), Mode::Else);
    // no branch may follow an else
    assert_eq!(ctx.call(Call::Else, &[], 0).unwrap(), Dispatch::Rejected);
    accept(&mut ctx, Call::IfEnd);
    assert_eq!(ctx.current_mode(), Mode::World);
    assert_eq!(ctx.call(Call::IfEnd, &[], 0).unwrap(), Dispatch::Rejected);
}

#[test]
fn motion_block_admits_transforms_not_scopes() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::WorldBegin);
    accept(&mut ctx, Call::MotionBegin { times: vec![0.0, 1.0] });
    accept(&mut ctx, Call::Translate { dx: 0.0, dy: 0.0, dz: 0.0 });
    accept(&mut ctx, Call::Translate { dx: 1.0, dy: 0.0, dz: 0.0 });
    assert_eq!(ctx.call(Call::AttributeBegin, &[], 0).unwrap(), Dispatch::Rejected);
    accept(&mut ctx, Call::MotionEnd);
}

#[test]
fn options_only_before_world() {
    let mut ctx = context();
    ctx.begin().unwrap();
    accept(&mut ctx, Call::Format { xres: 640, yres: 480, aspect: 1.0 });
    accept(&mut ctx, Call::WorldBegin);
    assert_eq!(
        ctx.call(Call::Format { xres: 640, yres: 480, aspect: 1.0 }, &[], 0).unwrap(),
        Dispatch::Rejected
    );
}

#[test]
fn closers_never_underflow() {
    let mut ctx = context();
    assert_eq!(ctx.call(Call::WorldEnd, &[], 0).unwrap(), Dispatch::Rejected);
    assert_eq!(ctx.end().unwrap(), Dispatch::Rejected);
    assert!(ctx.modes().is_empty());
    assert_eq!(ctx.error_count(), 2);
}
