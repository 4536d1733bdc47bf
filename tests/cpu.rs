mod common;

use pretty_assertions::assert_eq;

use common::{CODE, Event, RecordingBus, STACK_TOP, handler, load_words, machine, read_long, read_word};
use m68k_busd::cpu::{Cpu, StepError, StepOutcome, Vector};
use m68k_busd::decoder::{AddrReg, DataReg};
use m68k_busd::memory::{MemoryImage, MemorySegment};

const FLAG_C: u8 = 0x01;
const FLAG_V: u8 = 0x02;
const FLAG_Z: u8 = 0x04;
const FLAG_N: u8 = 0x08;
const FLAG_X: u8 = 0x10;

/// The long frame stacked for bus and address errors, lowest address first.
#[derive(Debug, PartialEq, Eq)]
struct AccessFrame {
    status_word: u16,
    address: u32,
    ir: u16,
    sr: u16,
    pc: u32,
}

fn access_frame(cpu: &Cpu<RecordingBus>) -> AccessFrame {
    let sp = cpu.ssp();
    AccessFrame {
        status_word: read_word(cpu, sp),
        address: read_long(cpu, sp + 2),
        ir: read_word(cpu, sp + 6),
        sr: read_word(cpu, sp + 8),
        pc: read_long(cpu, sp + 10),
    }
}

/// PC stacked by a short (group 1/2) frame.
fn stacked_pc(cpu: &Cpu<RecordingBus>) -> u32 {
    read_long(cpu, cpu.ssp() + 2)
}

fn notifications(cpu: &Cpu<RecordingBus>) -> Vec<Event> {
    cpu.bus()
        .events
        .iter()
        .filter(|e| !matches!(e, Event::Read { .. } | Event::Write { .. }))
        .cloned()
        .collect()
}

#[test]
fn reset_loads_stack_and_pc_from_vectors() {
    let cpu = machine(&[]);
    assert_eq!(cpu.ssp(), STACK_TOP);
    assert_eq!(cpu.pc(), CODE);
    assert_eq!(cpu.sr(), 0x2700);
    assert!(!cpu.is_halted());
}

#[test]
fn supervisor_bit_selects_the_stack_pointer() {
    let mut cpu = machine(&[]);
    cpu.set_usp(0x6000);
    cpu.set_addr_reg(AddrReg::A3, 0x3333);
    let before = cpu.registers();
    assert_eq!(before.a[7], STACK_TOP);

    cpu.set_sr(cpu.sr() & !0x2000);
    let after = cpu.registers();
    assert_eq!(after.a[7], 0x6000);
    assert_eq!(after.a[..7], before.a[..7]);
    assert_eq!(after.d, before.d);
    assert_eq!((after.ssp, after.usp, after.pc), (before.ssp, before.usp, before.pc));

    cpu.set_addr_reg(AddrReg::A7, 0x5000);
    assert_eq!(cpu.usp(), 0x5000);
    assert_eq!(cpu.ssp(), STACK_TOP);
}

#[test]
fn sr_writes_drop_undefined_bits() {
    let mut cpu = machine(&[]);
    cpu.set_sr(0xFFFF);
    assert_eq!(cpu.sr(), 0xA71F);
    assert_eq!(cpu.ccr(), 0x1F);
}

#[test]
fn swap_exchanges_halves_and_sets_flags() {
    let mut cpu = machine(&[0x4840, 0x4841]); // swap %d0; swap %d1
    cpu.set_data_reg(DataReg::D0, 0x0001_0000);
    cpu.set_ccr(FLAG_V | FLAG_C);

    assert_eq!(cpu.step().unwrap(), StepOutcome::Executed);
    assert_eq!(cpu.data_reg(DataReg::D0), 0x0000_0001);
    assert_eq!(cpu.ccr(), 0);

    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D1), 0);
    assert_eq!(cpu.ccr(), FLAG_Z);
}

#[test]
fn ext_sign_extends() {
    let mut cpu = machine(&[0x4880, 0x48C0]); // ext.w %d0; ext.l %d0
    cpu.set_data_reg(DataReg::D0, 0x1234_0080);

    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D0), 0x1234_FF80);
    assert_eq!(cpu.ccr(), FLAG_N);

    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D0), 0xFFFF_FF80);
    assert_eq!(cpu.ccr(), FLAG_N);
}

#[test]
fn exg_swaps_full_registers() {
    let mut cpu = machine(&[0xC38A]); // exg %d1, %a2
    cpu.set_data_reg(DataReg::D1, 0x1111_1111);
    cpu.set_addr_reg(AddrReg::A2, 0x2222_2222);
    cpu.set_ccr(FLAG_Z);

    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D1), 0x2222_2222);
    assert_eq!(cpu.addr_reg(AddrReg::A2), 0x1111_1111);
    assert_eq!(cpu.ccr(), FLAG_Z);
}

#[test]
fn move_b_sets_nz_and_keeps_x() {
    let mut cpu = machine(&[0x123C, 0x0080]); // move.b #0x80, %d1
    cpu.set_data_reg(DataReg::D1, 0xFFFF_FF00);
    cpu.set_ccr(FLAG_X | FLAG_V | FLAG_C);

    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D1), 0xFFFF_FF80);
    assert_eq!(cpu.ccr(), FLAG_X | FLAG_N);
    assert_eq!(cpu.pc(), CODE + 4);
}

#[test]
fn move_b_to_the_stack_keeps_it_word_aligned() {
    let mut cpu = machine(&[0x1F18]); // move.b (%a0)+, -(%a7)
    cpu.bus_mut().memory.load(0x2000, &[0x5A]).unwrap();
    cpu.set_addr_reg(AddrReg::A0, 0x2000);

    cpu.step().unwrap();
    assert_eq!(cpu.addr_reg(AddrReg::A0), 0x2001);
    assert_eq!(cpu.ssp(), STACK_TOP - 2);
    assert_eq!(cpu.bus().memory.read_byte(STACK_TOP - 2), Ok(0x5A));
}

#[test]
fn branch_offsets_are_relative_to_the_extension_word() {
    let mut cpu = machine(&[0x6004]); // bra 0x4
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), 0x1006);

    let mut cpu = machine(&[]);
    load_words(&mut cpu.bus_mut().memory, 0x2000, &[0x6000, 0xFFF0]);
    cpu.set_pc(0x2000);
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), 0x1FF2);
}

#[test]
fn bcc_falls_through_when_false() {
    let mut cpu = machine(&[0x6710]); // beq 0x10
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), CODE + 2);

    let mut cpu = machine(&[0x6710]);
    cpu.set_ccr(FLAG_Z);
    cpu.step().unwrap();
    assert_eq!(cpu.pc(), CODE + 0x12);
}

#[test]
fn dbf_terminates_when_counter_wraps() {
    let mut cpu = machine(&[0x51C8, 0xFFFE]); // dbf %d0, -0x2
    cpu.set_data_reg(DataReg::D0, 0xABCD_0000);
    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D0), 0xABCD_FFFF);
    assert_eq!(cpu.pc(), CODE + 4);

    let mut cpu = machine(&[0x51C8, 0xFFFE]);
    cpu.set_data_reg(DataReg::D0, 0x0000_0001);
    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D0), 0);
    assert_eq!(cpu.pc(), CODE);
}

#[test]
fn dbcc_with_true_condition_leaves_counter_alone() {
    let mut cpu = machine(&[0x50C8, 0xFFFE]); // dbt %d0, -0x2
    cpu.set_data_reg(DataReg::D0, 5);
    cpu.step().unwrap();
    assert_eq!(cpu.data_reg(DataReg::D0), 5);
    assert_eq!(cpu.pc(), CODE + 4);
}

#[test]
fn dbcc_odd_target_faults_before_decrementing() {
    let mut cpu = machine(&[0x51C8, 0xFFFF]);
    cpu.set_data_reg(DataReg::D0, 5);
    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ADDRESS_ERROR)
    );
    assert_eq!(cpu.data_reg(DataReg::D0), 5);
    assert_eq!(access_frame(&cpu).address, 0x1001);
}

#[test]
fn odd_branch_target_stacks_an_address_error_frame() {
    let mut cpu = machine(&[0x6001]); // bra 0x1
    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ADDRESS_ERROR)
    );
    assert_eq!(cpu.pc(), handler(Vector::ADDRESS_ERROR));
    assert_eq!(cpu.ssp(), STACK_TOP - 14);
    assert_eq!(
        access_frame(&cpu),
        AccessFrame {
            status_word: 0x6016, // IR high bits, read, supervisor program
            address: 0x1003,
            ir: 0x6001,
            sr: 0x2700,
            pc: 0x1002,
        }
    );
}

#[test]
fn unmapped_reads_raise_bus_errors() {
    let mut cpu = machine(&[0x1039, 0x00F0, 0x0000]); // move.b 0x00f00000.l, %d0
    assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(Vector::BUS_ERROR));
    assert_eq!(cpu.pc(), handler(Vector::BUS_ERROR));
    assert_eq!(
        access_frame(&cpu),
        AccessFrame {
            status_word: 0x1035, // read, supervisor data
            address: 0x00F0_0000,
            ir: 0x1039,
            sr: 0x2700,
            pc: 0x1006,
        }
    );
}

#[test]
fn fetch_bus_error_rewinds_pc() {
    let mut cpu = machine(&[]);
    cpu.set_pc(0x00F0_0000);
    assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(Vector::BUS_ERROR));
    assert_eq!(
        access_frame(&cpu),
        AccessFrame {
            status_word: 0x0016,
            address: 0x00F0_0000,
            ir: 0,
            sr: 0x2700,
            pc: 0x00F0_0000,
        }
    );
}

#[test]
fn writes_to_read_only_memory_raise_bus_errors() {
    use m68k_busd::memory::MemorySegment;

    let mut memory = common::ram();
    load_words(&mut memory, CODE, &[0x13C0, 0x0002, 0x0000]); // move.b %d0, 0x00020000.l
    memory.add_segment(MemorySegment::new(0x2_0000, vec![0; 4], false));
    let mut cpu = Cpu::new(RecordingBus::new(memory));
    cpu.reset().unwrap();

    assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(Vector::BUS_ERROR));
    let frame = access_frame(&cpu);
    assert_eq!(frame.address, 0x2_0000);
    assert_eq!(frame.status_word & 0x1F, 0x05); // write, supervisor data
}

#[test]
fn double_address_error_halts_without_stacking() {
    let mut cpu = machine(&[0x4AFC]); // illegal
    cpu.set_ssp(0x8001);

    let err = cpu.step().unwrap_err();
    let StepError::DoubleFault(fault) = err else {
        panic!("expected a double fault, got {err:?}");
    };
    assert_eq!(fault.vector, Vector::ADDRESS_ERROR);
    assert!(cpu.is_halted());
    assert_eq!(cpu.bus().writes(), 0);

    let traced: Vec<_> = notifications(&cpu);
    assert_eq!(traced.len(), 1);
    assert!(matches!(
        traced[0],
        Event::TraceMemoryException {
            vector: Vector::ADDRESS_ERROR,
            address: 0x7FF9,
            ..
        }
    ));

    assert_eq!(cpu.step().unwrap(), StepOutcome::Halted);
}

#[test]
fn double_bus_error_halts() {
    let mut cpu = machine(&[0x4AFC]);
    cpu.set_ssp(0x00F0_0000);

    assert!(matches!(
        cpu.step(),
        Err(StepError::DoubleFault(fault)) if fault.vector == Vector::BUS_ERROR
    ));
    assert!(cpu.is_halted());
}

#[test]
fn fault_while_stacking_a_trap_sets_instruction_not_bit() {
    // Vectors 0x00..0x1F are mapped; the trap vectors at 0x80 are not.
    let mut memory = MemoryImage::new(vec![
        MemorySegment::ram(0, 0x80),
        MemorySegment::ram(CODE, 0x8000),
    ]);
    load_words(&mut memory, 0, &[0, STACK_TOP as u16, 0, CODE as u16]);
    for vector in 2..0x20 {
        let entry = handler(Vector(vector)).to_be_bytes();
        memory.load(vector as u32 * 4, &entry).unwrap();
    }
    load_words(&mut memory, CODE, &[0x4E40]); // trap #0
    let mut cpu = Cpu::new(RecordingBus::new(memory));
    cpu.reset().unwrap();

    assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(Vector::BUS_ERROR));
    assert_eq!(cpu.pc(), handler(Vector::BUS_ERROR));
    assert_eq!(cpu.ssp(), STACK_TOP - 14);
    assert_eq!(
        access_frame(&cpu),
        AccessFrame {
            status_word: 0x4E5E, // IR high bits, read, I/N, supervisor program
            address: 0x80,
            ir: 0x4E40,
            sr: 0x2700,
            pc: 0x1002,
        }
    );
}

#[test]
fn illegal_and_unknown_opcodes_differ_in_stacked_pc() {
    let mut cpu = machine(&[0x4AFC]);
    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ILLEGAL_INSTRUCTION)
    );
    assert_eq!(stacked_pc(&cpu), CODE + 2);

    let mut cpu = machine(&[0x0000]);
    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ILLEGAL_INSTRUCTION)
    );
    assert_eq!(stacked_pc(&cpu), CODE);
    assert_eq!(cpu.pc(), handler(Vector::ILLEGAL_INSTRUCTION));
}

#[test]
fn line_a_and_line_f_trap_at_the_opcode() {
    for (opcode, vector) in [(0xA123, Vector::LINE_A), (0xF000, Vector::LINE_F)] {
        let mut cpu = machine(&[opcode]);
        assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(vector));
        assert_eq!(stacked_pc(&cpu), CODE);
        assert_eq!(read_word(&cpu, cpu.ssp()), 0x2700);
    }
}

#[test]
fn privileged_instructions_trap_in_user_mode() {
    let programs: [&[u16]; 5] = [
        &[0x4E70],         // reset
        &[0x4E73],         // rte
        &[0x4E60],         // move.l %a0, %usp
        &[0x4E68],         // move.l %usp, %a0
        &[0x4E72, 0x2700], // stop #0x2700
    ];
    for program in programs {
        let mut cpu = machine(program);
        cpu.set_usp(0x6000);
        cpu.set_addr_reg(AddrReg::A0, 0x1234);
        cpu.set_sr(0x0000);

        assert_eq!(
            cpu.step().unwrap(),
            StepOutcome::Exception(Vector::PRIVILEGE_VIOLATION),
            "{program:04x?}"
        );
        assert!(cpu.is_supervisor());
        assert_eq!(stacked_pc(&cpu), CODE);
        assert_eq!(read_word(&cpu, cpu.ssp()), 0x0000);
        assert_eq!(cpu.usp(), 0x6000);
        assert_eq!(cpu.addr_reg(AddrReg::A0), 0x1234);
        assert!(!cpu.is_halted());
        assert_eq!(cpu.bus().memory.reset_count(), 0);
    }
}

#[test]
fn reset_instruction_pulses_the_bus() {
    let mut cpu = machine(&[0x4E70]);
    cpu.step().unwrap();
    assert_eq!(notifications(&cpu), vec![Event::Reset]);
    assert_eq!(cpu.bus().memory.reset_count(), 1);
    assert_eq!(cpu.pc(), CODE + 2);
}

#[test]
fn usp_moves_in_supervisor_mode() {
    let mut cpu = machine(&[0x4E60, 0x4E69]); // move.l %a0, %usp; move.l %usp, %a1
    cpu.set_addr_reg(AddrReg::A0, 0x6000);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.usp(), 0x6000);
    assert_eq!(cpu.addr_reg(AddrReg::A1), 0x6000);
    assert_eq!(cpu.ssp(), STACK_TOP);
}

#[test]
fn stop_loads_sr_and_halts() {
    let mut cpu = machine(&[0x4E72, 0x2015]); // stop #0x2015
    assert_eq!(cpu.step().unwrap(), StepOutcome::Executed);
    assert!(cpu.is_halted());
    assert_eq!(cpu.sr(), 0x2015);
    assert_eq!(cpu.pc(), CODE + 4);
    assert_eq!(cpu.step().unwrap(), StepOutcome::Halted);

    cpu.set_halted(false);
    cpu.set_pc(CODE);
    assert_eq!(cpu.step().unwrap(), StepOutcome::Executed);
}

#[test]
fn traps_stack_the_following_pc() {
    let mut cpu = machine(&[0x4E43]); // trap #3
    assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(Vector::trap(3)));
    assert_eq!(cpu.pc(), handler(Vector(0x23)));
    assert_eq!(stacked_pc(&cpu), CODE + 2);
}

#[test]
fn trapv_only_fires_on_overflow() {
    let mut cpu = machine(&[0x4E76, 0x4E76]);
    assert_eq!(cpu.step().unwrap(), StepOutcome::Executed);
    cpu.set_ccr(FLAG_V);
    assert_eq!(cpu.step().unwrap(), StepOutcome::Exception(Vector::TRAPV));
}

#[test]
fn trace_events_report_execution_and_exceptions() {
    let mut cpu = machine(&[0x4E71, 0x4E43]); // nop; trap #3
    cpu.set_trace_exec(true);
    cpu.set_trace_exceptions(true);

    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(
        notifications(&cpu),
        vec![
            Event::TraceExec {
                pc: 0x1000,
                ir: 0x4E71,
                text: "nop".to_string(),
            },
            Event::TraceExec {
                pc: 0x1002,
                ir: 0x4E43,
                text: "trap #3".to_string(),
            },
            Event::TraceException {
                vector: Vector(0x23),
                pc: 0x1004,
            },
        ]
    );
}

#[test]
fn memory_exceptions_are_traced_with_their_frame_data() {
    let mut cpu = machine(&[0x6001]);
    cpu.set_trace_exceptions(true);
    cpu.step().unwrap();
    assert_eq!(
        notifications(&cpu),
        vec![Event::TraceMemoryException {
            vector: Vector::ADDRESS_ERROR,
            pc: 0x1002,
            ir: 0x6001,
            address: 0x1003,
            status: 0x16,
        }]
    );
}

#[test]
fn jsr_and_rts_round_trip() {
    let mut cpu = machine(&[0x4EB8, 0x1010]); // jsr 0x1010.w
    load_words(&mut cpu.bus_mut().memory, 0x1010, &[0x4E75]); // rts

    cpu.step().unwrap();
    assert_eq!(cpu.pc(), 0x1010);
    assert_eq!(cpu.ssp(), STACK_TOP - 4);
    assert_eq!(read_long(&cpu, STACK_TOP - 4), 0x1004);

    cpu.step().unwrap();
    assert_eq!(cpu.pc(), 0x1004);
    assert_eq!(cpu.ssp(), STACK_TOP);
}

#[test]
fn odd_jsr_target_faults_before_pushing() {
    let mut cpu = machine(&[0x4EB8, 0x1011]);
    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ADDRESS_ERROR)
    );
    assert_eq!(cpu.ssp(), STACK_TOP - 14);
    let frame = access_frame(&cpu);
    assert_eq!(frame.address, 0x1011);
    assert_eq!(frame.pc, 0x1004);
}

#[test]
fn odd_jmp_target_reports_pc_past_the_opcode() {
    let mut cpu = machine(&[0x4EF8, 0x1011]); // jmp 0x1011.w
    cpu.step().unwrap();
    assert_eq!(access_frame(&cpu).pc, 0x1002);
}

#[test]
fn odd_bsr_target_pushes_return_address_first() {
    let mut cpu = machine(&[0x6101]); // bsr 0x1
    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ADDRESS_ERROR)
    );
    assert_eq!(read_long(&cpu, STACK_TOP - 4), 0x1002);
    assert_eq!(cpu.ssp(), STACK_TOP - 4 - 14);
    assert_eq!(access_frame(&cpu).pc, 0x1003);
}

#[test]
fn odd_return_address_raises_address_error() {
    let mut cpu = machine(&[0x4E75]);
    cpu.bus_mut()
        .memory
        .load(STACK_TOP - 4, &0x1235u32.to_be_bytes())
        .unwrap();
    cpu.set_ssp(STACK_TOP - 4);

    cpu.step().unwrap();
    let frame = access_frame(&cpu);
    assert_eq!(frame.address, 0x1235);
    assert_eq!(frame.pc, CODE + 2);
    assert_eq!(cpu.ssp(), STACK_TOP - 14);
}

#[test]
fn rtr_restores_condition_codes() {
    let mut cpu = machine(&[0x4E77]);
    load_words(&mut cpu.bus_mut().memory, STACK_TOP - 6, &[0xFF1F, 0x0000, 0x1100]);
    cpu.set_ssp(STACK_TOP - 6);

    cpu.step().unwrap();
    assert_eq!(cpu.ccr(), 0x1F);
    assert_eq!(cpu.sr() & 0xFF00, 0x2700);
    assert_eq!(cpu.pc(), 0x1100);
    assert_eq!(cpu.ssp(), STACK_TOP);
}

#[test]
fn rte_restores_sr_and_pc() {
    let mut cpu = machine(&[0x4E73]);
    load_words(&mut cpu.bus_mut().memory, STACK_TOP - 6, &[0x0015, 0x0000, 0x1100]);
    cpu.set_ssp(STACK_TOP - 6);
    cpu.set_usp(0x6000);

    cpu.step().unwrap();
    assert_eq!(cpu.sr(), 0x0015);
    assert_eq!(cpu.pc(), 0x1100);
    assert_eq!(cpu.ssp(), STACK_TOP);
    assert!(!cpu.is_supervisor());
    assert_eq!(cpu.addr_reg(AddrReg::A7), 0x6000);
}

#[test]
fn rte_to_odd_pc_faults_in_the_restored_mode() {
    let mut cpu = machine(&[0x4E73]); // rte
    load_words(&mut cpu.bus_mut().memory, STACK_TOP - 6, &[0x0015, 0x0000, 0x1235]);
    cpu.set_ssp(STACK_TOP - 6);
    cpu.set_usp(0x6000);

    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ADDRESS_ERROR)
    );
    // The popped SR is live before the fault, so the frame records a user
    // program access and the restored SR.
    assert_eq!(cpu.ssp(), STACK_TOP - 14);
    assert_eq!(cpu.usp(), 0x6000);
    assert_eq!(
        access_frame(&cpu),
        AccessFrame {
            status_word: 0x4E72, // IR high bits, read, user program
            address: 0x1235,
            ir: 0x4E73,
            sr: 0x0015,
            pc: 0x1002,
        }
    );
    assert_eq!(cpu.sr(), 0x2015);
}

#[test]
fn link_and_unlk_build_and_tear_down_a_frame() {
    let mut cpu = machine(&[0x4E56, 0xFFF8, 0x4E5E]); // link %a6, #-0x8; unlk %a6
    cpu.set_addr_reg(AddrReg::A6, 0xCAFE_BABE);

    cpu.step().unwrap();
    assert_eq!(read_long(&cpu, STACK_TOP - 4), 0xCAFE_BABE);
    assert_eq!(cpu.addr_reg(AddrReg::A6), STACK_TOP - 4);
    assert_eq!(cpu.ssp(), STACK_TOP - 12);

    cpu.step().unwrap();
    assert_eq!(cpu.addr_reg(AddrReg::A6), 0xCAFE_BABE);
    assert_eq!(cpu.ssp(), STACK_TOP);
}

#[test]
fn unlk_with_odd_frame_pointer_skips_ahead_and_faults() {
    let mut cpu = machine(&[0x4E5E]);
    cpu.set_addr_reg(AddrReg::A6, 0x4001);

    assert_eq!(
        cpu.step().unwrap(),
        StepOutcome::Exception(Vector::ADDRESS_ERROR)
    );
    assert_eq!(
        access_frame(&cpu),
        AccessFrame {
            status_word: 0x4E55, // read, supervisor data
            address: 0x4001,
            ir: 0x4E5E,
            sr: 0x2700,
            pc: 0x1004,
        }
    );
    assert_eq!(cpu.addr_reg(AddrReg::A6), 0x4001);
}

#[test]
fn lea_and_pea_compute_without_reading() {
    let mut cpu = machine(&[0x41FA, 0x0010, 0x4851]); // lea 0x10(%pc), %a0; pea (%a1)
    cpu.set_addr_reg(AddrReg::A1, 0x00F0_0000);

    cpu.step().unwrap();
    assert_eq!(cpu.addr_reg(AddrReg::A0), 0x1012);

    cpu.step().unwrap();
    assert_eq!(read_long(&cpu, STACK_TOP - 4), 0x00F0_0000);
}

#[test]
fn registers_snapshot_prints_flags() {
    let mut cpu = machine(&[]);
    cpu.set_data_reg(DataReg::D3, 0xDEAD_BEEF);
    cpu.set_ccr(FLAG_Z | FLAG_C);
    let text = cpu.registers().to_string();
    assert!(text.contains("D3=DEADBEEF"), "{text}");
    assert!(text.contains("A7=00008000"), "{text}");
    assert!(text.ends_with("S--Z-C"), "{text}");
}
