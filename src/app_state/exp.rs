use core::convert::identity as id;
use core::fmt;

/// Experience points. Non-negative by construction; the database stores
/// them as `BIGINT`, hence the signed conversions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Exp(pub(crate) u64);

impl Exp {
    pub(crate) fn to_i64(self) -> i64 {
        let Exp(exp) = self;
        #[allow(clippy::cast_possible_wrap)]
        let exp = id::<u64>(exp) as i64;
        exp
    }

    pub(crate) fn from_i64(exp: i64) -> Self {
        debug_assert!(exp >= 0);
        #[allow(clippy::cast_sign_loss)]
        let exp: u64 = id::<i64>(exp) as u64;
        Exp(exp)
    }
}

impl core::ops::Add for Exp {
    type Output = Exp;

    fn add(self, rhs: Exp) -> Exp {
        Exp(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Exp {
    fn add_assign(&mut self, rhs: Exp) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::Exp;

    #[test]
    fn i64_round_trip() {
        assert_eq!(Exp::from_i64(0), Exp(0));
        assert_eq!(Exp::from_i64(155).to_i64(), 155);
        assert_eq!(Exp(u64::MAX / 2).to_i64(), (u64::MAX / 2) as i64);
    }
}
