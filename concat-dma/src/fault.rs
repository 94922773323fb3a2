//! Fault-frame capture and reporting.
//!
//! When a Cortex-M core takes a hard fault, the hardware pushes a frame of
//! eight registers onto the active stack and the fault status registers
//! describe what went wrong. The classic fault handler copies that state
//! aside and prints it before spinning.
//!
//! Here capture and reporting are split: a [`FaultFrame`] and the status
//! registers are plain data, and [`FaultReport`] is a pure
//! [`core::fmt::Display`] reproducing the traditional dump. The print path
//! can be exercised with any register snapshot, no faulting required.

use core::fmt;

bitfield::bitfield! {
    /// The Configurable Fault Status Register.
    ///
    /// Three status registers in one word: MemManage in bits 7:0, BusFault
    /// in 15:8, UsageFault in 31:16. A bit reads 1 if the corresponding
    /// condition contributed to the fault.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Cfsr(u32);
    impl Debug;
    /// Instruction access violation
    pub iaccviol, set_iaccviol: 0;
    /// Data access violation
    pub daccviol, set_daccviol: 1;
    /// MemManage fault on exception unstacking
    pub munstkerr, set_munstkerr: 3;
    /// MemManage fault on exception stacking
    pub mstkerr, set_mstkerr: 4;
    /// MMFAR holds a valid fault address
    pub mmarvalid, set_mmarvalid: 7;
    /// Instruction bus error
    pub ibuserr, set_ibuserr: 8;
    /// Precise data bus error
    pub preciserr, set_preciserr: 9;
    /// Imprecise data bus error
    pub impreciserr, set_impreciserr: 10;
    /// Bus fault on exception unstacking
    pub unstkerr, set_unstkerr: 11;
    /// Bus fault on exception stacking
    pub stkerr, set_stkerr: 12;
    /// BFAR holds a valid fault address
    pub bfarvalid, set_bfarvalid: 15;
    /// Undefined instruction
    pub undefinstr, set_undefinstr: 16;
    /// Invalid EPSR state
    pub invstate, set_invstate: 17;
    /// Invalid PC load
    pub invpc, set_invpc: 18;
    /// No coprocessor
    pub nocp, set_nocp: 19;
    /// Unaligned access trap
    pub unaligned, set_unaligned: 24;
    /// Divide by zero
    pub divbyzero, set_divbyzero: 25;
}

impl Cfsr {
    /// Wraps a raw register value.
    pub const fn from_bits(bits: u32) -> Self {
        Cfsr(bits)
    }

    /// The raw register value.
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// The register frame the hardware pushes on exception entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultFrame {
    /// r0 at the faulting instruction
    pub r0: u32,
    /// r1 at the faulting instruction
    pub r1: u32,
    /// r2 at the faulting instruction
    pub r2: u32,
    /// r3 at the faulting instruction
    pub r3: u32,
    /// r12 at the faulting instruction
    pub r12: u32,
    /// Link register
    pub lr: u32,
    /// Program counter of the faulting instruction
    pub pc: u32,
    /// Program status register
    pub psr: u32,
}

/// A complete fault snapshot: the pushed frame plus the status and address
/// registers, read out at the point of capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultReport {
    /// The hardware-pushed register frame.
    pub frame: FaultFrame,
    /// Configurable Fault Status Register at capture time.
    pub cfsr: Cfsr,
    /// MemManage fault address; meaningful only when `cfsr.mmarvalid()`.
    pub mmfar: u32,
    /// Bus fault address; meaningful only when `cfsr.bfarvalid()`.
    pub bfar: u32,
}

impl FaultReport {
    /// Builds a report from raw register values.
    pub const fn new(frame: FaultFrame, cfsr: u32, mmfar: u32, bfar: u32) -> Self {
        FaultReport {
            frame,
            cfsr: Cfsr::from_bits(cfsr),
            mmfar,
            bfar,
        }
    }
}

/// The traditional terminal dump: CFSR, conditional fault address lines
/// keyed on the valid bits, then the eight frame registers, one per line.
impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\r\nFAULT!!\r\n")?;
        write!(f, "SCB->CFSR = 0x{:08x}\r\n", self.cfsr.bits())?;
        if self.cfsr.mmarvalid() {
            write!(f, "MemManage Fault! Fault address = 0x{:08x}\r\n", self.mmfar)?;
        }
        if self.cfsr.bfarvalid() {
            write!(f, "Bus Fault! \r\nFault address = 0x{:08x}\r\n", self.bfar)?;
        }
        write!(f, "r0 = 0x{:08x}\r\n", self.frame.r0)?;
        write!(f, "r1 = 0x{:08x}\r\n", self.frame.r1)?;
        write!(f, "r2 = 0x{:08x}\r\n", self.frame.r2)?;
        write!(f, "r3 = 0x{:08x}\r\n", self.frame.r3)?;
        write!(f, "r12 = 0x{:08x}\r\n", self.frame.r12)?;
        write!(f, "lr = 0x{:08x}\r\n", self.frame.lr)?;
        write!(f, "pc = 0x{:08x}\r\n", self.frame.pc)?;
        write!(f, "psr = 0x{:08x}\r\n", self.frame.psr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfsr_decodes_the_valid_bits() {
        let cfsr = Cfsr::from_bits(1 << 7 | 1 << 1);
        assert!(cfsr.mmarvalid());
        assert!(cfsr.daccviol());
        assert!(!cfsr.bfarvalid());
        assert!(!cfsr.divbyzero());
    }

    #[test]
    fn divide_by_zero_sets_bit_25() {
        let mut cfsr = Cfsr::default();
        cfsr.set_divbyzero(true);
        assert_eq!(cfsr.bits(), 1 << 25);
    }

    #[test]
    fn dump_without_valid_addresses_skips_the_address_lines() {
        let report = FaultReport::new(FaultFrame::default(), 1 << 25, 0, 0);
        let dump = report.to_string();
        assert!(dump.starts_with("\r\nFAULT!!\r\nSCB->CFSR = 0x02000000\r\n"));
        assert!(!dump.contains("Fault address"));
        assert!(dump.ends_with("psr = 0x00000000\r\n"));
    }

    #[test]
    fn bus_fault_dump_reports_the_fault_address() {
        let frame = FaultFrame {
            r0: 0x0000_0000,
            r1: 0x0800_1234,
            r2: 0xdead_beef,
            r3: 0x0000_0001,
            r12: 0x2000_8000,
            lr: 0x1000_1d47,
            pc: 0x1000_1c2a,
            psr: 0x6100_0000,
        };
        let report = FaultReport::new(frame, 1 << 15 | 1 << 9, 0, 0x9000_0000);
        let dump = report.to_string();
        assert_eq!(
            dump,
            "\r\nFAULT!!\r\n\
             SCB->CFSR = 0x00008200\r\n\
             Bus Fault! \r\nFault address = 0x90000000\r\n\
             r0 = 0x00000000\r\n\
             r1 = 0x08001234\r\n\
             r2 = 0xdeadbeef\r\n\
             r3 = 0x00000001\r\n\
             r12 = 0x20008000\r\n\
             lr = 0x10001d47\r\n\
             pc = 0x10001c2a\r\n\
             psr = 0x61000000\r\n"
        );
    }
}
