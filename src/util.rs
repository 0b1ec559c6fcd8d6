/// Tolerance under which a float counts as a whole number.
///
/// This is the only place numerical slack is accepted in the conversion; every
/// near-integer test goes through [`is_whole`].
pub const WHOLE_EPSILON: f64 = 1e-6;

const FIELD_RESERVED: [char; 2] = [':', ';'];
const PATH_RESERVED: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

pub fn is_whole(n: f64) -> bool {
    (n - n.round()).abs() < WHOLE_EPSILON
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple of all values, or `None` if it does not fit in a `u64`.
pub fn lcm<I: IntoIterator<Item = u64>>(values: I) -> Option<u64> {
    values.into_iter().try_fold(1u64, |acc, v| {
        if v == 0 {
            return Some(acc);
        }
        (acc / gcd(acc, v)).checked_mul(v)
    })
}

pub fn gcd_all<I: IntoIterator<Item = u64>>(values: I) -> u64 {
    values.into_iter().fold(0, gcd)
}

/// Replaces the characters that terminate simfile tags with spaces.
pub fn escape_field(input: &str) -> String {
    input.replace(FIELD_RESERVED, " ")
}

/// Strips characters most file systems refuse in a path component.
pub fn escape_filename(input: &str) -> String {
    input.chars().filter(|c| !PATH_RESERVED.contains(c)).collect()
}
