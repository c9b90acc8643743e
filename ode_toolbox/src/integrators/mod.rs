/// Step-size control shared by embedded Runge-Kutta methods.
pub mod adaptive;
/// The Runge-Kutta-Fehlberg 4(5) method.
pub mod rkf45;

pub use rkf45::Rkf45;
