mod common;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use common::*;
use core_lib::config::CoreConfig;
use core_lib::control::{CoreControl, CoreState};
use core_lib::csr::{CAUSE_ECALL_M, MCAUSE, MEPC, MSCRATCH, MTVEC};
use core_lib::memory::htif::ExitStatus;
use core_lib::memory::StorageInterface;
use core_lib::run_wrapper::{drive, Verdict};

const BUDGET: u64 = 10_000;

/// A self-checking program in the riscv-tests layout: the body compares
/// 7 + 5 against `expected`, reports through `ecall` and a trap handler at
/// 0x40 stores `gp` to `tohost` at 0x1000.
fn self_check_program(expected: i32) -> Vec<u32> {
    let mut words = vec![
        addi(6, 0, 0x40),
        csrrw(0, MTVEC, 6),
        addi(1, 0, 7),
        addi(2, 0, 5),
        add(7, 1, 2),
        addi(8, 0, expected),
        bne(7, 8, 12),
        addi(3, 0, 1), // pass
        ECALL,
        addi(3, 0, 5), // fail, test 2
        ECALL,
    ];
    pad_to(&mut words, 16);
    words.extend([lui(30, 1), sw(3, 30, 0), jal(0, 0)]);
    words
}

#[rstest]
#[case::zero_latency(CoreConfig::zero_latency())]
#[case::default_latency(CoreConfig::default())]
fn self_check_passes(#[case] config: CoreConfig) {
    let mut core = pipelined_core(&self_check_program(12), config);
    let (verdict, _) = drive(&mut core, BUDGET);

    assert_eq!(verdict, Verdict::Passed);
    assert!(core.riscv_tests_passed());
    assert_eq!(core.state(), CoreState::Halted);
    assert_eq!(core.csr(MEPC), 0x20);
    assert_eq!(core.csr(MCAUSE), CAUSE_ECALL_M);
    assert_eq!(core.mem().get32(0x1000), Ok(1));
}

#[test]
fn self_check_failure_reports_test_number() {
    let mut core = pipelined_core(&self_check_program(13), CoreConfig::default());
    let (verdict, _) = drive(&mut core, BUDGET);

    assert_eq!(verdict, Verdict::Failed(Some(5)));
    assert_eq!(verdict.to_string(), "FAIL (test 2)");
    assert_eq!(core.exit_status(), Some(ExitStatus::Fail(2)));
    assert!(!core.riscv_tests_passed());
    assert_eq!(core.csr(MEPC), 0x28);
}

#[test]
fn single_cycle_agrees_on_self_check() {
    let mut core = single_cycle_core(&self_check_program(12), CoreConfig::default());
    assert_eq!(drive(&mut core, BUDGET).0, Verdict::Passed);

    let mut core = single_cycle_core(&self_check_program(13), CoreConfig::default());
    assert_eq!(drive(&mut core, BUDGET).0, Verdict::Failed(Some(5)));
}

#[test]
fn spin_loop_times_out() {
    let mut core = pipelined_core(&[jal(0, 0)], CoreConfig::default());
    let (verdict, cycles) = drive(&mut core, 200);
    assert_eq!(verdict, Verdict::Timeout);
    assert_eq!(cycles, 200);
    assert!(core.busy());
}

#[test]
fn back_to_back_dependencies_forward() {
    let words = [
        addi(1, 0, 1),
        add(2, 1, 1),
        add(3, 2, 1),
        add(4, 3, 2),
        add(5, 4, 1),
        sub(6, 5, 4),
        EBREAK,
    ];
    let mut core = pipelined_core(&words, CoreConfig::default());
    drive(&mut core, BUDGET);

    assert_eq!(core.state(), CoreState::Halted);
    assert_eq!((core.reg(2), core.reg(3), core.reg(4), core.reg(5), core.reg(6)), (2, 3, 5, 6, 1));
}

#[rstest]
#[case::zero_latency(CoreConfig::zero_latency())]
#[case::slow_memory(CoreConfig { mem_latency: 4, ..CoreConfig::default() })]
fn loads_see_earlier_stores(#[case] config: CoreConfig) {
    let words = [
        addi(1, 0, 0x123),
        sw(1, 0, 0x200),
        lw(2, 0, 0x200),
        addi(3, 2, 1),
        addi(4, 0, -1),
        sb(4, 0, 0x204),
        lb(5, 0, 0x204),
        lbu(6, 0, 0x204),
        add(7, 5, 6),
        EBREAK,
    ];
    let mut core = pipelined_core(&words, config);
    drive(&mut core, BUDGET);

    assert_eq!(core.reg(2), 0x123);
    assert_eq!(core.reg(3), 0x124);
    assert_eq!(core.reg(5), u32::MAX);
    assert_eq!(core.reg(6), 0xff);
    assert_eq!(core.reg(7), 0xfe);
    assert!(core.history().stall_count > 0);
}

#[test]
fn call_and_return() {
    let words = [
        addi(10, 0, 3),
        jal(1, 16),
        addi(11, 10, 0),
        EBREAK,
        addi(12, 0, 99),
        add(10, 10, 10),
        jalr(0, 1, 0),
    ];
    let mut core = pipelined_core(&words, CoreConfig::default());
    drive(&mut core, BUDGET);

    assert_eq!(core.reg(1), 8);
    assert_eq!(core.reg(10), 6);
    assert_eq!(core.reg(11), 6);
    assert_eq!(core.reg(12), 0);
}

#[test]
fn counted_loop_retires_same_instructions_as_single_cycle() {
    let words = [
        addi(1, 0, 10),
        addi(2, 0, 0),
        add(2, 2, 1),
        addi(1, 1, -1),
        bne(1, 0, -8),
        EBREAK,
    ];
    let mut pipe = pipelined_core(&words, CoreConfig::default());
    let mut single = single_cycle_core(&words, CoreConfig::default());
    let (_, pipe_cycles) = drive(&mut pipe, BUDGET);
    let (_, single_cycles) = drive(&mut single, BUDGET);

    assert_eq!(pipe.reg(2), 55);
    assert_eq!(single.reg(2), 55);
    assert_eq!(pipe.history().inst_count, 33);
    assert_eq!(single.cpu().history.inst_count, 33);
    assert_eq!(single_cycles, 33);
    assert!(pipe_cycles > single_cycles);
    // Two younger slots per taken branch
    assert_eq!(pipe.history().squash_count, 18 + 2);
    assert_eq!(pipe.ret_head(), pipe.mem_head());
}

#[test]
fn multiply_and_divide_edge_cases() {
    let words = [
        addi(1, 0, -7),
        addi(2, 0, 2),
        muldiv(0, 3, 1, 2),  // mul
        muldiv(1, 4, 1, 2),  // mulh
        muldiv(3, 5, 1, 2),  // mulhu
        muldiv(4, 6, 1, 2),  // div
        muldiv(6, 7, 1, 2),  // rem
        muldiv(5, 8, 1, 0),  // divu by zero
        muldiv(6, 9, 1, 0),  // rem by zero
        lui(10, 0x80000),
        addi(11, 0, -1),
        muldiv(4, 12, 10, 11), // overflow div
        muldiv(6, 13, 10, 11), // overflow rem
        EBREAK,
    ];
    let mut core = pipelined_core(&words, CoreConfig::default());
    drive(&mut core, BUDGET);

    assert_eq!(core.reg(3), -14i32 as u32);
    assert_eq!(core.reg(4), u32::MAX);
    assert_eq!(core.reg(5), 1);
    assert_eq!(core.reg(6), -3i32 as u32);
    assert_eq!(core.reg(7), u32::MAX);
    assert_eq!(core.reg(8), u32::MAX);
    assert_eq!(core.reg(9), -7i32 as u32);
    assert_eq!(core.reg(12), 0x8000_0000);
    assert_eq!(core.reg(13), 0);
}

#[test]
fn csr_read_modify_write() {
    let words = [
        addi(1, 0, 0x55),
        csrrw(2, MSCRATCH, 1),
        csrrs(3, MSCRATCH, 0),
        csrrwi(4, MSCRATCH, 7),
        csrrs(5, MSCRATCH, 1),
        add(6, 5, 4),
        EBREAK,
    ];
    let mut core = pipelined_core(&words, CoreConfig::default());
    drive(&mut core, BUDGET);

    assert_eq!(core.reg(2), 0);
    assert_eq!(core.reg(3), 0x55);
    assert_eq!(core.reg(4), 0x55);
    assert_eq!(core.reg(5), 7);
    assert_eq!(core.reg(6), 0x5c);
    assert_eq!(core.csr(MSCRATCH), 0x57);
}

#[test]
fn mret_returns_to_mepc() {
    let words = [
        addi(1, 0, 0x10),
        csrrw(0, MEPC, 1),
        MRET,
        addi(2, 0, 1),
        addi(3, 0, 2),
        EBREAK,
    ];
    let mut core = pipelined_core(&words, CoreConfig::default());
    drive(&mut core, BUDGET);

    assert_eq!(core.reg(2), 0);
    assert_eq!(core.reg(3), 2);
}

#[rstest]
#[case::zero_latency(CoreConfig::zero_latency())]
#[case::default_latency(CoreConfig::default())]
fn fence_i_refetches_patched_code(#[case] config: CoreConfig) {
    let words = [
        lui(5, 0x700),
        addi(5, 5, 0x193), // x5 = addi x3, x0, 7
        sw(5, 0, 0x14),
        FENCE_I,
        NOP,
        addi(3, 0, 1), // overwritten by the store
        EBREAK,
    ];
    let mut pipe = pipelined_core(&words, config);
    drive(&mut pipe, BUDGET);
    assert_eq!(pipe.reg(3), 7);
    assert_eq!(pipe.mem().get32(0x14), Ok(addi(3, 0, 7)));

    let mut single = single_cycle_core(&words, config);
    drive(&mut single, BUDGET);
    assert_eq!(single.reg(3), 7);
}

#[test]
fn reset_mid_run_restarts_from_reset_pc() {
    let words = [addi(1, 1, 1), jal(0, -4)];
    let mut core = pipelined_core(&words, CoreConfig::default());
    core.start();
    for _ in 0..20 {
        core.step();
    }
    let counted = core.reg(1);
    assert!(counted > 0);

    core.set_reset(true);
    assert_eq!(core.state(), CoreState::Reset);
    assert!(!core.busy());
    assert_eq!(core.pc(), 0);
    core.step();
    assert_eq!(core.reg(1), counted);

    core.set_reset(false);
    core.step();
    assert_eq!(core.state(), CoreState::Idle);
    core.step();
    assert_eq!(core.state(), CoreState::Idle);
    core.set_run(true);
    core.step();
    assert!(core.busy());
}

/// Straight-line instructions over x1..x7 and a small data window at 0x400
fn straight_line_instruction() -> impl Strategy<Value = u32> {
    (0usize..14, 1u8..8, 0u8..8, 0u8..8, -2048i32..2048).prop_map(|(kind, rd, rs1, rs2, imm)| {
        let offset = 0x400 + (imm & 0xc);
        match kind {
            0 => addi(rd, rs1, imm),
            1 => add(rd, rs1, rs2),
            2 => sub(rd, rs1, rs2),
            3 => r_type(0, rs2, rs1, 1, rd, OP), // sll
            4 => r_type(0x20, rs2, rs1, 5, rd, OP), // sra
            5 => r_type(0, rs2, rs1, 2, rd, OP), // slt
            6 => r_type(0, rs2, rs1, 3, rd, OP), // sltu
            7 => r_type(0, rs2, rs1, 4, rd, OP), // xor
            8 => muldiv(0, rd, rs1, rs2),
            9 => muldiv(4, rd, rs1, rs2),
            10 => muldiv(7, rd, rs1, rs2),
            11 => lui(rd, imm as u32 & 0xfffff),
            12 => sw(rs2, 0, offset),
            _ => lw(rd, 0, offset),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pipeline_matches_single_cycle(body in prop::collection::vec(straight_line_instruction(), 1..40)) {
        let mut words = body;
        words.push(EBREAK);

        let mut single = single_cycle_core(&words, CoreConfig::default());
        drive(&mut single, BUDGET);
        let expected = single.cpu().dump_registers();

        for config in [CoreConfig::default(), CoreConfig::zero_latency()] {
            let mut pipe = pipelined_core(&words, config);
            let (_, cycles) = drive(&mut pipe, BUDGET);
            prop_assert!(cycles < BUDGET);
            prop_assert_eq!(pipe.cpu().dump_registers(), expected.clone());
            prop_assert_eq!(pipe.history().inst_count, words.len() as u64);
        }
    }
}
