use rand::Rng;

/// Number of digits in a room code
pub const ROOM_CODE_LEN: usize = 5;

/// Generate a random 5-digit room code in `10000..=99999`
pub fn generate_room_code() -> String {
    rand::thread_rng().gen_range(10_000..=99_999u32).to_string()
}

/// Whether `code` has the shape of a room code (5 ASCII digits, no leading zero)
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code.bytes().all(|b| b.is_ascii_digit())
        && !code.starts_with('0')
}
