// config file
pub const CONFIG_FILE_NAME: &str = "surfhop.toml";
// trajectory record file
pub const TRAJECTORY_FILE_NAME: &str = "trajectory.yaml";
// number of nuclear steps
pub const NSTEP: usize = 1000;
// nuclear stepsize in atomic units
pub const STEPSIZE: f64 = 0.1;
// number of electronic states
pub const NSTATES: usize = 1;
// initial electronic state
pub const INITIAL_STATE: usize = 0;
// seed of the trajectory random stream
pub const SEED: u64 = 0;
// new trajectory or resume from an existing record
pub const RESTART: bool = false;
// temperature (K) for Boltzmann velocity sampling
pub const TEMPERATURE: f64 = 300.0;
pub const USE_SURFACE_HOPPING: bool = true;
// sub-intervals of the electronic propagation per nuclear step
pub const INTEGRATION_SUBSTEPS: usize = 20;
// constant in hartree
// recommended value for C in eqn. (17) of JCP 126, 134114 (2007)
pub const DECOHERENCE_CONSTANT: f64 = 0.1;
// warm-up steps before hop selection becomes active; the gap-history
// algorithms need three energy snapshots
pub const WARMUP_STEPS: usize = 2;
// minimum number of recorded steps required to resume a trajectory
pub const MIN_RESTART_RECORDS: usize = 3;
// cache trust radii
pub const TRUST_RADIUS_GENERAL: f64 = 0.75;
pub const TRUST_RADIUS_CI: f64 = 0.25;
// adjacent-state gap below which the strict trust radius applies (hartree)
pub const ENERGY_THRESHOLD: f64 = 0.02;
pub const USE_CACHE: bool = true;
pub const FIT_COUPLINGS: bool = false;
// Gaussian RBF kernel width
pub const RBF_EPSILON: f64 = 1.0;
// ridge added to the RBF kernel diagonal
pub const RBF_REGULARIZATION: f64 = 1.0e-10;
// Shepard weighting exponent
pub const SHEPARD_POWER: f64 = 2.0;
// polynomial regression degree
pub const POLYNOMIAL_DEGREE: usize = 2;
// displacement of the finite-difference gradient estimation
pub const FD_STEPSIZE: f64 = 1.0e-4;
// distance below which a query coincides with a stored sample
pub const DEGENERATE_DISTANCE: f64 = 1.0e-10;
pub const PRINT_TRAJECTORY: bool = true;
pub const PRINT_HOPPING: bool = false;
