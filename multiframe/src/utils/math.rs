/// Integer division rounding towards positive infinity.
///
/// Used to compute workgroup counts, e.g. `ceil_div(1920, 32) == 60`.
pub fn ceil_div(dividend: u32, divisor: u32) -> u32 {
    assert!(divisor > 0, "Division by zero");

    dividend.div_ceil(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(0, ceil_div(0, 32));
        assert_eq!(1, ceil_div(1, 32));
        assert_eq!(1, ceil_div(32, 32));
        assert_eq!(2, ceil_div(33, 32));
        assert_eq!(34, ceil_div(1080, 32));
    }

    #[test]
    #[should_panic(expected = "Division by zero")]
    fn ceil_div_by_zero() {
        ceil_div(1, 0);
    }
}
