use phf::phf_map;

// Conversion factors between atomic units and the units used for I/O.
pub const FS_TO_AU: f64 = 41.341374575751;
pub const BOHR_TO_ANGS: f64 = 0.529177249;
pub const HARTREE_TO_EV: f64 = 27.2114;
// Boltzmann constant in hartree/K
pub const K_BOLTZMANN: f64 = 3.166811429e-6;
// Atomic mass unit in electron masses
pub const AMU_TO_AU: f64 = 1822.888486;

/// Atomic masses in atomic units (electron masses), indexed by atomic number.
pub static ATOMIC_MASSES: phf::Map<u8, f64> = phf_map! {
    1u8 => 1837.47060108,
    2u8 => 7296.29912628,
    3u8 => 12652.66897194,
    4u8 => 16428.20286282,
    5u8 => 19707.24740624,
    6u8 => 21894.16697663,
    7u8 => 25532.65220141,
    8u8 => 29165.12220221,
    9u8 => 34631.97042049,
    10u8 => 36785.34275970,
    11u8 => 41907.78590078,
    12u8 => 44305.30465963,
    13u8 => 49184.33554237,
    14u8 => 51196.73451111,
    15u8 => 56461.71228234,
    16u8 => 58450.91927589,
    17u8 => 64626.86550887,
    18u8 => 72820.74924585,
};
