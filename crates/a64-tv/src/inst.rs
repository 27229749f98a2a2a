//! Decoded-instruction model.
//!
//! The decoder collaborator hands the lifter a stream of [`Inst`]s: an
//! opcode class, an ordered operand list, and (when available) the
//! 4-byte little-endian machine encoding used to key the semantics
//! backend. Width and vector arrangement live in the operands, so one
//! opcode covers the W/X and arrangement variants of a class.

use crate::{Error, Result};

/// General-purpose register width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    W,
    X,
}

impl RegWidth {
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::W => 32,
            Self::X => 64,
        }
    }

    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::W => 'W',
            Self::X => 'X',
        }
    }
}

/// Scalar floating-point / SIMD register width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpWidth {
    B,
    H,
    S,
    D,
    Q,
}

impl FpWidth {
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::B => 8,
            Self::H => 16,
            Self::S => 32,
            Self::D => 64,
            Self::Q => 128,
        }
    }

    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::B => 'B',
            Self::H => 'H',
            Self::S => 'S',
            Self::D => 'D',
            Self::Q => 'Q',
        }
    }
}

/// Vector arrangement: lane count times element width, e.g. `4h` is
/// `lanes = 4, elem_bits = 16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VecArr {
    pub lanes: u32,
    pub elem_bits: u32,
}

impl VecArr {
    #[must_use]
    pub const fn new(lanes: u32, elem_bits: u32) -> Self {
        Self { lanes, elem_bits }
    }

    #[must_use]
    pub fn total_bits(self) -> u32 {
        self.lanes * self.elem_bits
    }

    /// The arrangement covering the other half of a 128-bit register,
    /// e.g. `8b` for `16b` sources of narrowing second-half ops.
    #[must_use]
    pub fn halved(self) -> Self {
        Self::new(self.lanes / 2, self.elem_bits)
    }

    /// Widened element arrangement for long ops (`4h` -> `4s`).
    #[must_use]
    pub fn widened(self) -> Self {
        Self::new(self.lanes, self.elem_bits * 2)
    }
}

/// General-purpose register reference. `Sp` addresses state cell 31;
/// `Zr` reads as zero and discards writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gpr {
    R(u8),
    Sp,
    Zr,
}

/// AArch64 condition codes, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    Eq = 0,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
    Nv,
}

impl Cond {
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0xf {
            0 => Self::Eq,
            1 => Self::Ne,
            2 => Self::Cs,
            3 => Self::Cc,
            4 => Self::Mi,
            5 => Self::Pl,
            6 => Self::Vs,
            7 => Self::Vc,
            8 => Self::Hi,
            9 => Self::Ls,
            10 => Self::Ge,
            11 => Self::Lt,
            12 => Self::Gt,
            13 => Self::Le,
            14 => Self::Al,
            _ => Self::Nv,
        }
    }

    /// The inverse condition (`EQ` <-> `NE`, ...). `AL`/`NV` invert to
    /// each other per the encoding, though neither is conditional.
    #[must_use]
    pub fn invert(self) -> Self {
        Self::from_bits(self as u8 ^ 1)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Cs => "CS",
            Self::Cc => "CC",
            Self::Mi => "MI",
            Self::Pl => "PL",
            Self::Vs => "VS",
            Self::Vc => "VC",
            Self::Hi => "HI",
            Self::Ls => "LS",
            Self::Ge => "GE",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LE",
            Self::Al => "AL",
            Self::Nv => "NV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendKind {
    Uxtb,
    Uxth,
    Uxtw,
    Uxtx,
    Sxtb,
    Sxth,
    Sxtw,
    Sxtx,
}

impl ExtendKind {
    #[must_use]
    pub fn source_bits(self) -> u32 {
        match self {
            Self::Uxtb | Self::Sxtb => 8,
            Self::Uxth | Self::Sxth => 16,
            Self::Uxtw | Self::Sxtw => 32,
            Self::Uxtx | Self::Sxtx => 64,
        }
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Sxtb | Self::Sxth | Self::Sxtw | Self::Sxtx)
    }
}

/// One instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Gpr { width: RegWidth, reg: Gpr },
    Fp { width: FpWidth, reg: u8 },
    Vec { reg: u8, arr: VecArr },
    VecElem { reg: u8, elem_bits: u32, lane: u32 },
    Imm(i64),
    Shift { kind: ShiftKind, amount: u8 },
    Extend { kind: ExtendKind, amount: u8 },
    Cond(Cond),
    /// Branch target: index into the instruction stream.
    Label(usize),
    /// Symbol reference; a leading `:` marks a relocation form.
    Sym(String),
}

/// Opcode classes covered by the lifter. The discriminant (`opcode as
/// u32`) is the stable id matched against the `ASLP_BANNED` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // Branches, calls, system
    B,
    Bl,
    Br,
    Blr,
    Ret,
    BCond,
    Cbz,
    Cbnz,
    Tbz,
    Tbnz,
    Brk,
    Hint,
    Prfm,
    Prfum,
    Paciasp,
    Pacibsp,
    Autiasp,
    Autibsp,
    Mrs,
    Msr,
    Adr,
    Adrp,

    // Integer arithmetic
    AddImm,
    AddsImm,
    SubImm,
    SubsImm,
    AddShift,
    AddsShift,
    SubShift,
    SubsShift,
    AddExt,
    AddsExt,
    SubExt,
    SubsExt,
    Adc,
    Adcs,
    Sbc,
    Sbcs,
    Asrv,
    Lslv,
    Lsrv,
    Rorv,

    // Logical
    AndImm,
    AndsImm,
    OrrImm,
    EorImm,
    AndShift,
    AndsShift,
    OrrShift,
    OrnShift,
    EorShift,
    EonShift,
    BicShift,
    BicsShift,

    // Bitfield / extract
    Sbfm,
    Ubfm,
    Bfm,
    Extr,

    // Conditional family
    Csel,
    Csinc,
    Csinv,
    Csneg,
    Ccmp,
    Ccmn,

    // Wide moves
    Movz,
    Movn,
    Movk,

    // Multiply / divide
    Madd,
    Msub,
    Smaddl,
    Umaddl,
    Smsubl,
    Umsubl,
    Smulh,
    Umulh,
    Sdiv,
    Udiv,

    // Bit manipulation
    Rbit,
    Rev,
    Rev16,
    Rev32,
    Clz,

    // Scalar loads (dest operand gives size for Ldr/Str; B/H forms are
    // separate classes since the memory size differs from the register)
    LdrUi,
    LdrUr,
    LdrPre,
    LdrPost,
    LdrRo,
    LdrbUi,
    LdrbUr,
    LdrbPre,
    LdrbPost,
    LdrbRo,
    LdrhUi,
    LdrhUr,
    LdrhPre,
    LdrhPost,
    LdrhRo,
    LdrsbUi,
    LdrsbUr,
    LdrsbPre,
    LdrsbPost,
    LdrsbRo,
    LdrshUi,
    LdrshUr,
    LdrshPre,
    LdrshPost,
    LdrshRo,
    LdrswUi,
    LdrswUr,
    LdrswPre,
    LdrswPost,
    LdrswRo,

    // Scalar stores
    StrUi,
    StrUr,
    StrPre,
    StrPost,
    StrRo,
    StrbUi,
    StrbUr,
    StrbPre,
    StrbPost,
    StrbRo,
    StrhUi,
    StrhUr,
    StrhPre,
    StrhPost,
    StrhRo,

    // Pair forms
    Ldp,
    LdpPre,
    LdpPost,
    Ldpsw,
    LdpswPre,
    LdpswPost,
    Stp,
    StpPre,
    StpPost,

    // Vector structure loads/stores; Ld1Multi/St1Multi are the
    // contiguous multi-register LD1/ST1 forms, LdN/StN the
    // de-interleaving LD2/LD3/LD4 and ST equivalents
    Ld1Lane,
    Ld1LanePost,
    Ld1Rep,
    Ld1RepPost,
    Ld1Multi,
    Ld1MultiPost,
    LdN,
    LdNPost,
    St1Lane,
    St1LanePost,
    St1Multi,
    St1MultiPost,
    StN,
    StNPost,

    // SIMD integer, lane-wise
    AddV,
    SubV,
    MulV,
    MulVIdx,
    AndV,
    OrrV,
    OrnV,
    EorV,
    BicV,
    NotV,
    NegV,
    AbsV,
    CntV,
    ClzV,
    RbitV,
    Rev64V,
    Rev32V,
    Rev16V,

    // SIMD reductions and pairwise
    Addv,
    AddpV,
    AddpScalar,
    Saddlv,
    Uaddlv,
    Saddlp,
    Uaddlp,
    Sadalp,
    Uadalp,
    SminV,
    SmaxV,
    UminV,
    UmaxV,
    Sminp,
    Smaxp,
    Uminp,
    Umaxp,
    Sminv,
    Smaxv,
    Uminv,
    Umaxv,

    // SIMD multiply-accumulate
    Mla,
    Mls,
    MlaIdx,
    MlsIdx,
    Smull,
    Umull,
    SmullIdx,
    UmullIdx,
    Smlal,
    Umlal,
    Smlsl,
    Umlsl,
    SmlalIdx,
    UmlalIdx,
    SmlslIdx,
    UmlslIdx,

    // SIMD widening / halving add-sub
    Saddl,
    Uaddl,
    Saddw,
    Uaddw,
    Ssubl,
    Usubl,
    Ssubw,
    Usubw,
    Shadd,
    Uhadd,
    Srhadd,
    Urhadd,
    Shsub,
    Uhsub,

    // SIMD absolute difference
    Sabd,
    Uabd,
    Saba,
    Uaba,
    Sabdl,
    Uabdl,
    Sabal,
    Uabal,

    // SIMD shifts / narrow / lengthen
    SshrV,
    UshrV,
    ShlV,
    Sshl,
    Ushl,
    Sshll,
    Ushll,
    Shll,
    Shrn,
    Rshrn,
    Xtn,
    Sqxtn,
    Uqxtn,
    Ssra,
    Usra,
    Sli,
    Sri,

    // SIMD saturating
    Uqadd,
    Sqadd,
    Uqsub,
    Sqsub,

    // SIMD compares
    Cmeq,
    Cmge,
    Cmgt,
    Cmhi,
    Cmhs,
    Cmtst,
    CmeqZ,
    CmgeZ,
    CmgtZ,
    CmleZ,
    CmltZ,

    // SIMD permute / insert / dup
    Zip1,
    Zip2,
    Uzp1,
    Uzp2,
    Trn1,
    Trn2,
    ExtV,
    DupElem,
    DupGpr,
    InsElem,
    InsGpr,
    Smov,
    Umov,
    Tbl,
    Bif,
    Bit,
    Bsl,

    // SIMD immediates
    Movi,
    Mvni,
    MoviMsl,
    MvniMsl,
    FmovVecImm,

    // FP scalar
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Fnmul,
    Fmin,
    Fmax,
    Fminnm,
    Fmaxnm,
    Fneg,
    Fabs,
    Fsqrt,
    Fmadd,
    Fmsub,
    Fnmadd,
    Fnmsub,
    FmulIdx,
    FmlaIdx,
    FmlsIdx,
    Fcmp,
    Fcmpe,
    Fccmp,
    Fcsel,
    Fcvt,
    Fcvtzs,
    Fcvtzu,
    Scvtf,
    Ucvtf,
    Frinta,
    Frintm,
    Frintp,
    Frintx,
    Fmov,
    FmovImm,

    // FP vector
    FaddV,
    FsubV,
    FmulV,
    FnegV,
    FcmeqV,
    FcmgtV,
    FcmgeV,
    FcmeqVz,
    FcmgtVz,
    FcmgeVz,
    FcmleVz,
    FcmltVz,
}

impl Opcode {
    /// Stable numeric id, matched against the `ASLP_BANNED` list.
    #[must_use]
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Branch, return, call, and indirect-branch classes are never
    /// routed to the structured path.
    #[must_use]
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            Self::B
                | Self::Bl
                | Self::Br
                | Self::Blr
                | Self::Ret
                | Self::BCond
                | Self::Cbz
                | Self::Cbnz
                | Self::Tbz
                | Self::Tbnz
        )
    }

    #[must_use]
    pub fn base_name(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::Bl => "BL",
            Self::Br => "BR",
            Self::Blr => "BLR",
            Self::Ret => "RET",
            Self::BCond => "Bcc",
            Self::Cbz => "CBZ",
            Self::Cbnz => "CBNZ",
            Self::Tbz => "TBZ",
            Self::Tbnz => "TBNZ",
            Self::Brk => "BRK",
            Self::Hint => "HINT",
            Self::Prfm => "PRFM",
            Self::Prfum => "PRFUM",
            Self::Paciasp => "PACIASP",
            Self::Pacibsp => "PACIBSP",
            Self::Autiasp => "AUTIASP",
            Self::Autibsp => "AUTIBSP",
            Self::Mrs => "MRS",
            Self::Msr => "MSR",
            Self::Adr => "ADR",
            Self::Adrp => "ADRP",
            Self::AddImm | Self::AddShift | Self::AddExt => "ADD",
            Self::AddsImm | Self::AddsShift | Self::AddsExt => "ADDS",
            Self::SubImm | Self::SubShift | Self::SubExt => "SUB",
            Self::SubsImm | Self::SubsShift | Self::SubsExt => "SUBS",
            Self::Adc => "ADC",
            Self::Adcs => "ADCS",
            Self::Sbc => "SBC",
            Self::Sbcs => "SBCS",
            Self::Asrv => "ASRV",
            Self::Lslv => "LSLV",
            Self::Lsrv => "LSRV",
            Self::Rorv => "RORV",
            Self::AndImm | Self::AndShift => "AND",
            Self::AndsImm | Self::AndsShift => "ANDS",
            Self::OrrImm | Self::OrrShift | Self::OrrV => "ORR",
            Self::EorImm | Self::EorShift | Self::EorV => "EOR",
            Self::OrnShift | Self::OrnV => "ORN",
            Self::EonShift => "EON",
            Self::BicShift | Self::BicV => "BIC",
            Self::BicsShift => "BICS",
            Self::Sbfm => "SBFM",
            Self::Ubfm => "UBFM",
            Self::Bfm => "BFM",
            Self::Extr => "EXTR",
            Self::Csel => "CSEL",
            Self::Csinc => "CSINC",
            Self::Csinv => "CSINV",
            Self::Csneg => "CSNEG",
            Self::Ccmp => "CCMP",
            Self::Ccmn => "CCMN",
            Self::Movz => "MOVZ",
            Self::Movn => "MOVN",
            Self::Movk => "MOVK",
            Self::Madd => "MADD",
            Self::Msub => "MSUB",
            Self::Smaddl => "SMADDL",
            Self::Umaddl => "UMADDL",
            Self::Smsubl => "SMSUBL",
            Self::Umsubl => "UMSUBL",
            Self::Smulh => "SMULH",
            Self::Umulh => "UMULH",
            Self::Sdiv => "SDIV",
            Self::Udiv => "UDIV",
            Self::Rbit | Self::RbitV => "RBIT",
            Self::Rev => "REV",
            Self::Rev16 | Self::Rev16V => "REV16",
            Self::Rev32 | Self::Rev32V => "REV32",
            Self::Rev64V => "REV64",
            Self::Clz | Self::ClzV => "CLZ",
            Self::LdrUi | Self::LdrPre | Self::LdrPost | Self::LdrRo => "LDR",
            Self::LdrUr => "LDUR",
            Self::LdrbUi | Self::LdrbPre | Self::LdrbPost | Self::LdrbRo => "LDRB",
            Self::LdrbUr => "LDURB",
            Self::LdrhUi | Self::LdrhPre | Self::LdrhPost | Self::LdrhRo => "LDRH",
            Self::LdrhUr => "LDURH",
            Self::LdrsbUi | Self::LdrsbPre | Self::LdrsbPost | Self::LdrsbRo => "LDRSB",
            Self::LdrsbUr => "LDURSB",
            Self::LdrshUi | Self::LdrshPre | Self::LdrshPost | Self::LdrshRo => "LDRSH",
            Self::LdrshUr => "LDURSH",
            Self::LdrswUi | Self::LdrswPre | Self::LdrswPost | Self::LdrswRo => "LDRSW",
            Self::LdrswUr => "LDURSW",
            Self::StrUi | Self::StrPre | Self::StrPost | Self::StrRo => "STR",
            Self::StrUr => "STUR",
            Self::StrbUi | Self::StrbPre | Self::StrbPost | Self::StrbRo => "STRB",
            Self::StrbUr => "STURB",
            Self::StrhUi | Self::StrhPre | Self::StrhPost | Self::StrhRo => "STRH",
            Self::StrhUr => "STURH",
            Self::Ldp | Self::LdpPre | Self::LdpPost => "LDP",
            Self::Ldpsw | Self::LdpswPre | Self::LdpswPost => "LDPSW",
            Self::Stp | Self::StpPre | Self::StpPost => "STP",
            Self::Ld1Lane | Self::Ld1LanePost => "LD1i",
            Self::Ld1Rep | Self::Ld1RepPost => "LD1R",
            Self::Ld1Multi | Self::Ld1MultiPost => "LD1",
            Self::LdN | Self::LdNPost => "LDN",
            Self::St1Lane | Self::St1LanePost => "ST1i",
            Self::St1Multi | Self::St1MultiPost => "ST1",
            Self::StN | Self::StNPost => "STN",
            Self::AddV => "ADD",
            Self::SubV => "SUB",
            Self::MulV | Self::MulVIdx => "MUL",
            Self::AndV => "AND",
            Self::NotV => "NOT",
            Self::NegV => "NEG",
            Self::AbsV => "ABS",
            Self::CntV => "CNT",
            Self::Addv => "ADDV",
            Self::AddpV | Self::AddpScalar => "ADDP",
            Self::Saddlv => "SADDLV",
            Self::Uaddlv => "UADDLV",
            Self::Saddlp => "SADDLP",
            Self::Uaddlp => "UADDLP",
            Self::Sadalp => "SADALP",
            Self::Uadalp => "UADALP",
            Self::SminV => "SMIN",
            Self::SmaxV => "SMAX",
            Self::UminV => "UMIN",
            Self::UmaxV => "UMAX",
            Self::Sminp => "SMINP",
            Self::Smaxp => "SMAXP",
            Self::Uminp => "UMINP",
            Self::Umaxp => "UMAXP",
            Self::Sminv => "SMINV",
            Self::Smaxv => "SMAXV",
            Self::Uminv => "UMINV",
            Self::Umaxv => "UMAXV",
            Self::Mla | Self::MlaIdx => "MLA",
            Self::Mls | Self::MlsIdx => "MLS",
            Self::Smull | Self::SmullIdx => "SMULL",
            Self::Umull | Self::UmullIdx => "UMULL",
            Self::Smlal | Self::SmlalIdx => "SMLAL",
            Self::Umlal | Self::UmlalIdx => "UMLAL",
            Self::Smlsl | Self::SmlslIdx => "SMLSL",
            Self::Umlsl | Self::UmlslIdx => "UMLSL",
            Self::Saddl => "SADDL",
            Self::Uaddl => "UADDL",
            Self::Saddw => "SADDW",
            Self::Uaddw => "UADDW",
            Self::Ssubl => "SSUBL",
            Self::Usubl => "USUBL",
            Self::Ssubw => "SSUBW",
            Self::Usubw => "USUBW",
            Self::Shadd => "SHADD",
            Self::Uhadd => "UHADD",
            Self::Srhadd => "SRHADD",
            Self::Urhadd => "URHADD",
            Self::Shsub => "SHSUB",
            Self::Uhsub => "UHSUB",
            Self::Sabd => "SABD",
            Self::Uabd => "UABD",
            Self::Saba => "SABA",
            Self::Uaba => "UABA",
            Self::Sabdl => "SABDL",
            Self::Uabdl => "UABDL",
            Self::Sabal => "SABAL",
            Self::Uabal => "UABAL",
            Self::SshrV => "SSHR",
            Self::UshrV => "USHR",
            Self::ShlV => "SHL",
            Self::Sshl => "SSHL",
            Self::Ushl => "USHL",
            Self::Sshll => "SSHLL",
            Self::Ushll => "USHLL",
            Self::Shll => "SHLL",
            Self::Shrn => "SHRN",
            Self::Rshrn => "RSHRN",
            Self::Xtn => "XTN",
            Self::Sqxtn => "SQXTN",
            Self::Uqxtn => "UQXTN",
            Self::Ssra => "SSRA",
            Self::Usra => "USRA",
            Self::Sli => "SLI",
            Self::Sri => "SRI",
            Self::Uqadd => "UQADD",
            Self::Sqadd => "SQADD",
            Self::Uqsub => "UQSUB",
            Self::Sqsub => "SQSUB",
            Self::Cmeq | Self::CmeqZ => "CMEQ",
            Self::Cmge | Self::CmgeZ => "CMGE",
            Self::Cmgt | Self::CmgtZ => "CMGT",
            Self::Cmhi => "CMHI",
            Self::Cmhs => "CMHS",
            Self::Cmtst => "CMTST",
            Self::CmleZ => "CMLE",
            Self::CmltZ => "CMLT",
            Self::Zip1 => "ZIP1",
            Self::Zip2 => "ZIP2",
            Self::Uzp1 => "UZP1",
            Self::Uzp2 => "UZP2",
            Self::Trn1 => "TRN1",
            Self::Trn2 => "TRN2",
            Self::ExtV => "EXT",
            Self::DupElem | Self::DupGpr => "DUP",
            Self::InsElem | Self::InsGpr => "INS",
            Self::Smov => "SMOV",
            Self::Umov => "UMOV",
            Self::Tbl => "TBL",
            Self::Bif => "BIF",
            Self::Bit => "BIT",
            Self::Bsl => "BSL",
            Self::Movi | Self::MoviMsl => "MOVI",
            Self::Mvni | Self::MvniMsl => "MVNI",
            Self::FmovVecImm | Self::Fmov | Self::FmovImm => "FMOV",
            Self::Fadd | Self::FaddV => "FADD",
            Self::Fsub | Self::FsubV => "FSUB",
            Self::Fmul | Self::FmulIdx | Self::FmulV => "FMUL",
            Self::Fdiv => "FDIV",
            Self::Fnmul => "FNMUL",
            Self::Fmin => "FMIN",
            Self::Fmax => "FMAX",
            Self::Fminnm => "FMINNM",
            Self::Fmaxnm => "FMAXNM",
            Self::Fneg | Self::FnegV => "FNEG",
            Self::Fabs => "FABS",
            Self::Fsqrt => "FSQRT",
            Self::Fmadd => "FMADD",
            Self::Fmsub => "FMSUB",
            Self::Fnmadd => "FNMADD",
            Self::Fnmsub => "FNMSUB",
            Self::FmlaIdx => "FMLA",
            Self::FmlsIdx => "FMLS",
            Self::Fcmp => "FCMP",
            Self::Fcmpe => "FCMPE",
            Self::Fccmp => "FCCMP",
            Self::Fcsel => "FCSEL",
            Self::Fcvt => "FCVT",
            Self::Fcvtzs => "FCVTZS",
            Self::Fcvtzu => "FCVTZU",
            Self::Scvtf => "SCVTF",
            Self::Ucvtf => "UCVTF",
            Self::Frinta => "FRINTA",
            Self::Frintm => "FRINTM",
            Self::Frintp => "FRINTP",
            Self::Frintx => "FRINTX",
            Self::FcmeqV | Self::FcmeqVz => "FCMEQ",
            Self::FcmgtV | Self::FcmgtVz => "FCMGT",
            Self::FcmgeV | Self::FcmgeVz => "FCMGE",
            Self::FcmleVz => "FCMLE",
            Self::FcmltVz => "FCMLT",
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone)]
pub struct Inst {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// The 4-byte little-endian machine encoding, when the decoder
    /// could supply it. `None` routes the instruction classic-only.
    pub encoding: Option<[u8; 4]>,
}

impl Inst {
    #[must_use]
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            opcode,
            operands,
            encoding: None,
        }
    }

    #[must_use]
    pub fn with_encoding(mut self, bytes: [u8; 4]) -> Self {
        self.encoding = Some(bytes);
        self
    }

    /// The 32-bit opcode integer used to key the semantics backend.
    #[must_use]
    pub fn encoding_u32(&self) -> Option<u32> {
        self.encoding.map(u32::from_le_bytes)
    }

    /// Human-readable opcode name used for metadata tagging, in the
    /// familiar `ADDWri` / `DUPv4i16gpr` shape: base name plus a width
    /// or arrangement suffix derived from the operands.
    #[must_use]
    pub fn mnemonic(&self) -> String {
        let base = self.opcode.base_name();
        let suffix = self
            .operands
            .iter()
            .find_map(|op| match op {
                Operand::Gpr { width, .. } => Some(width.letter().to_string()),
                Operand::Fp { width, .. } => Some(width.letter().to_string()),
                Operand::Vec { arr, .. } => {
                    Some(format!("v{}i{}", arr.lanes, arr.elem_bits))
                }
                Operand::VecElem { elem_bits, .. } => Some(format!("i{elem_bits}")),
                _ => None,
            })
            .unwrap_or_default();
        format!("{base}{suffix}")
    }

    fn shape_err(&self, index: usize, wanted: &str) -> Error {
        Error::InvariantViolation(format!(
            "{}: operand {index} is not a {wanted} (operands: {:?})",
            self.mnemonic(),
            self.operands
        ))
    }

    pub fn gpr(&self, index: usize) -> Result<(RegWidth, Gpr)> {
        match self.operands.get(index) {
            Some(Operand::Gpr { width, reg }) => Ok((*width, *reg)),
            _ => Err(self.shape_err(index, "general register")),
        }
    }

    pub fn fp(&self, index: usize) -> Result<(FpWidth, u8)> {
        match self.operands.get(index) {
            Some(Operand::Fp { width, reg }) => Ok((*width, *reg)),
            _ => Err(self.shape_err(index, "fp register")),
        }
    }

    pub fn vec(&self, index: usize) -> Result<(u8, VecArr)> {
        match self.operands.get(index) {
            Some(Operand::Vec { reg, arr }) => Ok((*reg, *arr)),
            _ => Err(self.shape_err(index, "vector register")),
        }
    }

    pub fn vec_elem(&self, index: usize) -> Result<(u8, u32, u32)> {
        match self.operands.get(index) {
            Some(Operand::VecElem {
                reg,
                elem_bits,
                lane,
            }) => Ok((*reg, *elem_bits, *lane)),
            _ => Err(self.shape_err(index, "vector element")),
        }
    }

    pub fn imm(&self, index: usize) -> Result<i64> {
        match self.operands.get(index) {
            Some(Operand::Imm(v)) => Ok(*v),
            _ => Err(self.shape_err(index, "immediate")),
        }
    }

    pub fn cond(&self, index: usize) -> Result<Cond> {
        match self.operands.get(index) {
            Some(Operand::Cond(c)) => Ok(*c),
            _ => Err(self.shape_err(index, "condition")),
        }
    }

    pub fn label(&self, index: usize) -> Result<usize> {
        match self.operands.get(index) {
            Some(Operand::Label(target)) => Ok(*target),
            _ => Err(self.shape_err(index, "label")),
        }
    }

    pub fn sym(&self, index: usize) -> Result<&str> {
        match self.operands.get(index) {
            Some(Operand::Sym(s)) => Ok(s),
            _ => Err(self.shape_err(index, "symbol")),
        }
    }

    pub fn shift(&self, index: usize) -> Result<(ShiftKind, u8)> {
        match self.operands.get(index) {
            Some(Operand::Shift { kind, amount }) => Ok((*kind, *amount)),
            _ => Err(self.shape_err(index, "shift modifier")),
        }
    }

    pub fn extend(&self, index: usize) -> Result<(ExtendKind, u8)> {
        match self.operands.get(index) {
            Some(Operand::Extend { kind, amount }) => Ok((*kind, *amount)),
            _ => Err(self.shape_err(index, "extend modifier")),
        }
    }
}

/// Decode an AArch64 logical (bitmask) immediate from its `N:immr:imms`
/// fields, as used by the logical-immediate and bitfield instruction
/// forms. Returns `None` for reserved encodings.
#[must_use]
pub fn decode_logical_imm(n: u32, immr: u32, imms: u32, reg_bits: u32) -> Option<u64> {
    let combined = (n << 6) | (!imms & 0x3f);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    if reg_bits == 32 && n != 0 {
        return None;
    }

    let esize = 1u32 << len;
    let levels = esize - 1;
    let s = imms & levels;
    let r = immr & levels;
    if s == levels {
        // all-ones element is reserved
        return None;
    }

    let welem: u64 = if s + 1 == 64 {
        u64::MAX
    } else {
        (1u64 << (s + 1)) - 1
    };
    let elem = if r == 0 {
        welem
    } else {
        // rotate right within the element
        let r = u64::from(r);
        let esize = u64::from(esize);
        let mask = if esize == 64 {
            u64::MAX
        } else {
            (1u64 << esize) - 1
        };
        ((welem >> r) | (welem << (esize - r))) & mask
    };

    let mut out = 0u64;
    let mut pos = 0;
    while pos < reg_bits {
        out |= elem << pos;
        pos += esize;
    }
    if reg_bits == 32 {
        out &= 0xffff_ffff;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cond_inversion_pairs() {
        assert_eq!(Cond::Eq.invert(), Cond::Ne);
        assert_eq!(Cond::Ne.invert(), Cond::Eq);
        assert_eq!(Cond::Hi.invert(), Cond::Ls);
        assert_eq!(Cond::Lt.invert(), Cond::Ge);
        assert_eq!(Cond::Gt.invert(), Cond::Le);
    }

    #[test]
    fn logical_imm_known_values() {
        // 0x5555555555555555: N=0 immr=0 imms=0b111100 (2-bit elements, one set)
        assert_eq!(
            decode_logical_imm(0, 0, 0b11_1100, 64),
            Some(0x5555_5555_5555_5555)
        );
        // 0xff: N=1 immr=0 imms=7 (64-bit element, low 8 ones)
        assert_eq!(decode_logical_imm(1, 0, 7, 64), Some(0xff));
        // 32-bit 0xf000000f: 32-bit element of 8 ones rotated right by 4
        assert_eq!(decode_logical_imm(0, 4, 7, 32), Some(0xf000_000f));
        // reserved: all-ones element
        assert_eq!(decode_logical_imm(0, 0, 0b11_1111, 64), None);
        // N set for a 32-bit operation is reserved
        assert_eq!(decode_logical_imm(1, 0, 7, 32), None);
    }

    #[test]
    fn mnemonic_shapes() {
        let add = Inst::new(
            Opcode::AddImm,
            vec![
                Operand::Gpr {
                    width: RegWidth::W,
                    reg: Gpr::R(0),
                },
                Operand::Gpr {
                    width: RegWidth::W,
                    reg: Gpr::R(1),
                },
                Operand::Imm(4),
            ],
        );
        assert_eq!(add.mnemonic(), "ADDW");

        let dup = Inst::new(
            Opcode::DupGpr,
            vec![
                Operand::Vec {
                    reg: 0,
                    arr: VecArr::new(4, 16),
                },
                Operand::Gpr {
                    width: RegWidth::W,
                    reg: Gpr::R(1),
                },
            ],
        );
        assert_eq!(dup.mnemonic(), "DUPv4i16");
    }

    #[test]
    fn encoding_folds_little_endian() {
        let inst = Inst::new(Opcode::Brk, vec![Operand::Imm(0)]).with_encoding([0, 0, 32, 212]);
        assert_eq!(inst.encoding_u32(), Some(0xd420_0000));
    }
}
