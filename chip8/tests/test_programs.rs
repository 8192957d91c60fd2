use chip8::{constants::*, prelude::*, FrameBuffer, KeyCode};

fn load(program: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        rng_seed: Some(1),
        ..Chip8Conf::default()
    });
    vm.load_bytecode(program).unwrap();
    vm
}

fn frame(vm: &mut Chip8Vm) {
    vm.render(&Palette::default(), &mut FrameBuffer::new());
}

#[test]
#[rustfmt::skip]
fn test_add_program() {
    let mut vm = load(&[
        0x60, 0x0A, // LD V0, 10
        0x61, 0x05, // LD V1, 5
        0x80, 0x14, // ADD V0, V1
    ]);

    for _ in 0..3 {
        vm.tick().unwrap();
    }

    let cpu = vm.cpu();
    assert_eq!(cpu.register(0).unwrap(), 15);
    assert_eq!(cpu.register(0xF).unwrap(), 0);
    assert_eq!(cpu.pc(), 0x206);
}

#[test]
#[rustfmt::skip]
fn test_key_wait_resumes_on_press() {
    let mut vm = load(&[
        0xF5, 0x0A, // LD V5, K
        0x00, 0xE0, // CLS
    ]);

    for _ in 0..10 {
        assert_eq!(vm.tick(), Ok(Flow::KeyWait));
        assert_eq!(vm.cpu().pc(), MEM_START);
    }

    vm.set_key(KeyCode::Key3, true);
    assert_eq!(vm.tick(), Ok(Flow::Ok));
    assert_eq!(vm.cpu().register(5).unwrap(), 3);
    assert_eq!(vm.cpu().pc(), MEM_START + 2);
}

#[test]
#[rustfmt::skip]
fn test_clear_after_draw() {
    let mut vm = load(&[
        0x60, 0x07, // LD V0, 7
        0xF0, 0x29, // LD F, V0
        0xD0, 0x05, // DRW V0, V0, 5
        0x00, 0xE0, // CLS
    ]);
    vm.run_steps(2).unwrap();

    frame(&mut vm);
    assert_eq!(vm.tick(), Ok(Flow::Draw));
    assert!(vm.display_buffer().iter().any(|px| *px));
    assert_eq!(vm.dump_display().unwrap().matches('#').count(), 4 + 1 + 1 + 1 + 1);

    vm.tick().unwrap();
    assert!(vm.display_buffer().iter().all(|px| !px));
}

#[test]
#[rustfmt::skip]
fn test_render_pass_colors() {
    let mut vm = load(&[
        0xA0, 0x50, // LD I, 0x050
        0xD0, 0x01, // DRW V0, V0, 1
    ]);
    let palette = Palette {
        background: chip8::Color::rgb(0, 0, 0x40),
        foreground: chip8::Color::rgb(0, 0xFF, 0),
    };
    let mut surface = FrameBuffer::new();

    vm.tick().unwrap();
    vm.render(&palette, &mut surface);
    vm.tick().unwrap();
    // The draw is only visible on the next pass.
    assert_eq!(surface.pixel(0, 0), palette.background);

    vm.render(&palette, &mut surface);
    assert_eq!(surface.pixel(0, 0), palette.foreground);
    assert_eq!(surface.pixel(3, 0), palette.foreground);
    assert_eq!(surface.pixel(4, 0), palette.background);
}

#[test]
fn test_switching_programs() {
    let mut vm = load(&[0x6A, 0x42, 0xA3, 0x00, 0xFA, 0x55]);
    vm.run_steps(3).unwrap();
    assert_eq!(vm.cpu().register(0xA).unwrap(), 0x42);
    assert_eq!(vm.cpu().read_byte(0x30A).unwrap(), 0x42);

    vm.load_bytecode(&[0x00, 0xE0]).unwrap();
    assert_eq!(vm.cpu().register(0xA).unwrap(), 0);
    assert_eq!(vm.cpu().read_byte(0x30A).unwrap(), 0);
    assert_eq!(vm.cpu().address(), 0);
    assert_eq!(vm.cpu().program_end(), MEM_START + 2);
}

#[test]
fn test_fault_stops_machine() {
    let mut vm = load(&[0x60, 0x01, 0xFF, 0xFF, 0x60, 0x02]);
    vm.tick().unwrap();

    let err = vm.tick().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "unknown opcode FFFF at 0202");

    assert_eq!(vm.run_steps(10), Err(err));
    assert_eq!(vm.cpu().register(0).unwrap(), 1);
}

#[test]
fn test_large_program_is_rejected() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    let err = vm.load_bytecode(&vec![0; MAX_PROGRAM_SIZE + 2]).unwrap_err();
    assert!(matches!(err, Chip8Error::LargeProgram { .. }));
    assert!(!err.is_fatal());
    assert_eq!(vm.tick(), Err(Chip8Error::NoProgram));
}

#[test]
#[rustfmt::skip]
fn test_countdown_loop() {
    // Wait on the delay timer, then halt.
    let mut vm = load(&[
        0x60, 0x03, // 200: LD V0, 3
        0xF0, 0x15, // 202: LD DT, V0
        0xF1, 0x07, // 204: LD V1, DT
        0x31, 0x00, // 206: SE V1, 0
        0x12, 0x04, // 208: JP 204
    ]);

    let mut frames = 0;
    while !vm.is_halted() {
        vm.run_steps(7).unwrap();
        frame(&mut vm);
        frames += 1;
        assert!(frames < 10, "countdown never finished");
    }
    assert_eq!(vm.cpu().delay_timer(), 0);
    assert_eq!(vm.cpu().pc(), 0x20A);
}
