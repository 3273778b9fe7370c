//! Single-qubit unitaries.
//!
//! [`Unitary2x2`] is the fast path used by dynamical-decoupling padding:
//! echo sequences are single-qubit, and absorbing an inverse gate into a
//! neighbour only needs 2x2 products and a ZYZ decomposition. General
//! multi-qubit matrices live in [`crate::operator`].

use std::f64::consts::PI;
use std::sync::LazyLock;

use num_complex::Complex64;

use cadence_ir::{Gate, GateKind, StandardGate};

/// Tolerance for the degenerate branches of the ZYZ decomposition.
const EPSILON: f64 = 1e-10;

/// A 2x2 unitary matrix in row-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unitary2x2 {
    /// `[[a, b], [c, d]]` stored as `[a, b, c, d]`.
    pub data: [Complex64; 4],
}

impl Unitary2x2 {
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    fn real(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self::new(a.into(), b.into(), c.into(), d.into())
    }

    fn diag(phase: f64) -> Self {
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::from_polar(1.0, phase),
        )
    }

    pub fn identity() -> Self {
        Self::real(1.0, 0.0, 0.0, 1.0)
    }

    pub fn h() -> Self {
        let s = 1.0 / 2.0_f64.sqrt();
        Self::real(s, s, s, -s)
    }

    pub fn x() -> Self {
        Self::real(0.0, 1.0, 1.0, 0.0)
    }

    pub fn y() -> Self {
        Self::new(
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, -1.0),
            Complex64::new(0.0, 1.0),
            Complex64::new(0.0, 0.0),
        )
    }

    pub fn z() -> Self {
        Self::real(1.0, 0.0, 0.0, -1.0)
    }

    pub fn s() -> Self {
        Self::diag(PI / 2.0)
    }

    pub fn sdg() -> Self {
        Self::diag(-PI / 2.0)
    }

    pub fn t() -> Self {
        Self::diag(PI / 4.0)
    }

    pub fn tdg() -> Self {
        Self::diag(-PI / 4.0)
    }

    pub fn sx() -> Self {
        let p = Complex64::new(0.5, 0.5);
        let m = Complex64::new(0.5, -0.5);
        Self::new(p, m, m, p)
    }

    pub fn sxdg() -> Self {
        Self::sx().dagger()
    }

    pub fn rx(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(0.0, -s),
            Complex64::new(0.0, -s),
            Complex64::new(c, 0.0),
        )
    }

    pub fn ry(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::real(c, -s, s, c)
    }

    pub fn rz(theta: f64) -> Self {
        Self::new(
            Complex64::from_polar(1.0, -theta / 2.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::from_polar(1.0, theta / 2.0),
        )
    }

    pub fn p(lambda: f64) -> Self {
        Self::diag(lambda)
    }

    /// U(θ, φ, λ).
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(
            Complex64::new(c, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        )
    }

    /// Matrix of a single-qubit standard gate with numeric parameters.
    pub fn from_standard(gate: &StandardGate) -> Option<Self> {
        static U_I: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::identity);
        static U_X: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::x);
        static U_Y: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::y);
        static U_Z: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::z);
        static U_H: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::h);
        static U_SX: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::sx);
        static U_SXDG: LazyLock<Unitary2x2> = LazyLock::new(Unitary2x2::sxdg);

        match gate {
            StandardGate::I => Some(*U_I),
            StandardGate::X => Some(*U_X),
            StandardGate::Y => Some(*U_Y),
            StandardGate::Z => Some(*U_Z),
            StandardGate::H => Some(*U_H),
            StandardGate::S => Some(Self::s()),
            StandardGate::Sdg => Some(Self::sdg()),
            StandardGate::T => Some(Self::t()),
            StandardGate::Tdg => Some(Self::tdg()),
            StandardGate::SX => Some(*U_SX),
            StandardGate::SXdg => Some(*U_SXDG),
            StandardGate::Rx(p) => p.as_f64().map(Self::rx),
            StandardGate::Ry(p) => p.as_f64().map(Self::ry),
            StandardGate::Rz(p) => p.as_f64().map(Self::rz),
            StandardGate::P(p) => p.as_f64().map(Self::p),
            StandardGate::U(theta, phi, lambda) => {
                Some(Self::u(theta.as_f64()?, phi.as_f64()?, lambda.as_f64()?))
            }
            _ => None,
        }
    }

    /// Matrix of a single-qubit gate, standard or custom with explicit matrix.
    pub fn from_gate(gate: &Gate) -> Option<Self> {
        match &gate.kind {
            GateKind::Standard(g) => Self::from_standard(g),
            GateKind::Custom(g) if g.num_qubits == 1 => {
                let m = g.matrix.as_ref()?;
                Some(Self::new(m[0], m[1], m[2], m[3]))
            }
            GateKind::Custom(_) => None,
        }
    }

    /// `self * other`.
    #[allow(clippy::many_single_char_names)]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h)
    }

    /// Conjugate transpose.
    pub fn dagger(&self) -> Self {
        Self::new(
            self.data[0].conj(),
            self.data[2].conj(),
            self.data[1].conj(),
            self.data[3].conj(),
        )
    }

    /// Identity up to a global phase.
    pub fn is_identity_up_to_phase(&self, tolerance: f64) -> bool {
        let [a, b, c, d] = self.data;
        b.norm() <= tolerance && c.norm() <= tolerance && (a - d).norm() <= tolerance
    }

    /// Element-wise comparison.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.data
            .iter()
            .zip(&other.data)
            .all(|(a, b)| (a - b).norm() <= tolerance)
    }

    /// Decompose into `e^{i phase} Rz(alpha) Ry(beta) Rz(gamma)`.
    ///
    /// Returns `(alpha, beta, gamma, phase)`.
    pub fn zyz_decomposition(&self) -> (f64, f64, f64, f64) {
        let [a, b, c, d] = self.data;

        let det = a * d - b * c;
        let phase = det.arg() / 2.0;

        // Normalize to SU(2):
        // [[cos(β/2) e^{-i(α+γ)/2}, -sin(β/2) e^{-i(α-γ)/2}],
        //  [sin(β/2) e^{ i(α-γ)/2},  cos(β/2) e^{ i(α+γ)/2}]]
        let unphase = Complex64::from_polar(1.0, -phase);
        let a = a * unphase;
        let b = b * unphase;
        let c = c * unphase;

        let beta = 2.0 * a.norm().min(1.0).acos();

        if beta.abs() < EPSILON {
            let alpha_plus_gamma = -2.0 * a.arg();
            return (alpha_plus_gamma / 2.0, 0.0, alpha_plus_gamma / 2.0, phase);
        }
        if (beta - PI).abs() < EPSILON {
            let alpha_minus_gamma = -2.0 * (-b).arg();
            return (alpha_minus_gamma / 2.0, PI, -alpha_minus_gamma / 2.0, phase);
        }

        let alpha_plus_gamma = -2.0 * a.arg();
        let alpha_minus_gamma = 2.0 * c.arg();
        let alpha = f64::midpoint(alpha_plus_gamma, alpha_minus_gamma);
        let gamma = (alpha_plus_gamma - alpha_minus_gamma) / 2.0;
        (alpha, beta, gamma, phase)
    }

    /// Express as `e^{i phase} U(theta, phi, lambda)`.
    ///
    /// Returns `(theta, phi, lambda, phase)`.
    pub fn to_u_angles(&self) -> (f64, f64, f64, f64) {
        let (alpha, beta, gamma, phase) = self.zyz_decomposition();
        // U(β, α, γ) = e^{i(α+γ)/2} Rz(α) Ry(β) Rz(γ)
        (beta, alpha, gamma, phase - (alpha + gamma) / 2.0)
    }

    /// Wrap an angle into `[-π, π]`.
    pub fn normalize_angle(angle: f64) -> f64 {
        if !angle.is_finite() {
            return 0.0;
        }
        let mut a = angle.rem_euclid(2.0 * PI);
        if a > PI {
            a -= 2.0 * PI;
        }
        a
    }
}

impl Default for Unitary2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Unitary2x2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Unitary2x2::mul(&self, &rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_reconstructs(u: &Unitary2x2) {
        let (theta, phi, lambda, phase) = u.to_u_angles();
        let rebuilt = Unitary2x2::u(theta, phi, lambda);
        let global = Complex64::from_polar(1.0, phase);
        for i in 0..4 {
            let got = rebuilt.data[i] * global;
            assert!(
                (u.data[i] - got).norm() < 1e-9,
                "Mismatch at {i}: expected {:?}, got {got:?}",
                u.data[i]
            );
        }
    }

    #[test]
    fn test_self_inverse_paulis() {
        for u in [Unitary2x2::x(), Unitary2x2::y(), Unitary2x2::z(), Unitary2x2::h()] {
            assert!((u * u).approx_eq(&Unitary2x2::identity(), 1e-12));
        }
    }

    #[test]
    fn test_xy4_is_identity_up_to_phase() {
        let (x, y) = (Unitary2x2::x(), Unitary2x2::y());
        let seq = y * x * y * x;
        assert!(seq.is_identity_up_to_phase(1e-12));
    }

    #[test]
    fn test_sx_dagger() {
        let product = Unitary2x2::sx() * Unitary2x2::sxdg();
        assert!(product.approx_eq(&Unitary2x2::identity(), 1e-12));
    }

    #[test]
    fn test_u_angles_reconstruct() {
        let samples = [
            Unitary2x2::identity(),
            Unitary2x2::h(),
            Unitary2x2::x(),
            Unitary2x2::y(),
            Unitary2x2::rz(0.3),
            Unitary2x2::u(1.1, -0.4, 2.9),
            Unitary2x2::x() * Unitary2x2::u(0.1, 0.2, 0.3),
            Unitary2x2::sx() * Unitary2x2::t(),
        ];
        for u in &samples {
            assert_reconstructs(u);
        }
    }

    #[test]
    fn test_from_gate() {
        let rx = Gate::standard(StandardGate::Rx(0.5.into()));
        assert!(Unitary2x2::from_gate(&rx).unwrap().approx_eq(&Unitary2x2::rx(0.5), 1e-15));
        let sym = Gate::standard(StandardGate::Rx("theta".into()));
        assert!(Unitary2x2::from_gate(&sym).is_none());
        assert!(Unitary2x2::from_gate(&Gate::standard(StandardGate::CX)).is_none());
    }

    #[test]
    fn test_normalize_angle() {
        assert!((Unitary2x2::normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert_eq!(Unitary2x2::normalize_angle(f64::NAN), 0.0);
    }
}
