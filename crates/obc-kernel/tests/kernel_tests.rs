use obc_kernel::{
    BufferTooSmall, ErrorChain, ErrorCode, Event, ModuleId, UnknownModule,
};

#[test]
fn event_partitions_module_and_code() {
    let event = Event::new(ModuleId::I2c, 0x02);
    assert_eq!(event.raw(), 0x1002);
    assert_eq!(event.module(), Ok(ModuleId::I2c));
    assert_eq!(event.code(), 0x02);
    assert!(!event.is_none());
    assert!(Event::NONE.is_none());
}

#[test]
fn event_with_unknown_module() {
    let event = Event::from_raw(0x7F01);
    assert_eq!(event.module(), Err(UnknownModule(0x7F)));
}

#[test]
fn event_display_is_hex() {
    let event = Event::new(ModuleId::EventManager, 0x0A);
    assert_eq!(format!("{}", event), "0x020A");
}

#[test]
fn error_code_never_collides_with_none() {
    let code = ErrorCode::new(ModuleId::Kernel, 0);
    assert!(!code.is_none());
    assert_eq!(code.module(), Ok(ModuleId::Kernel));
    assert_eq!(code.local(), 0);
}

#[test]
fn chain_tracks_top_and_root() {
    let top = ErrorCode::new(ModuleId::Imu, 1);
    let root = ErrorCode::new(ModuleId::I2c, 0x20);

    let mut chain: ErrorChain<4> = ErrorChain::from_code(top);
    chain.push_cause(root).unwrap();

    assert_eq!(chain.code(), Some(top));
    assert_eq!(chain.root_cause(), Some(root));
    assert_eq!(chain.len(), 2);
    assert_eq!(format!("{}", chain), "0x2001 <- 0x1020");
}

#[test]
fn chain_rejects_overflow() {
    let mut chain: ErrorChain<1> =
        ErrorChain::from_code(ErrorCode::from_raw(1));
    let extra = ErrorCode::from_raw(2);
    assert_eq!(chain.push_cause(extra), Err(extra));
    assert_eq!(chain.len(), 1);
}

#[test]
fn chain_encodes_big_endian() {
    let mut chain: ErrorChain<3> =
        ErrorChain::from_code(ErrorCode::from_raw(0x2001));
    chain.push_cause(ErrorCode::from_raw(0x1020)).unwrap();

    let mut out = [0u8; 6];
    assert_eq!(chain.encode(&mut out), Ok(4));
    assert_eq!(&out[..4], &[0x20, 0x01, 0x10, 0x20]);

    let mut short = [0u8; 3];
    assert_eq!(chain.encode(&mut short), Err(BufferTooSmall { needed: 4 }));
}
