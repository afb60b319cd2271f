pub mod time;

/// Generate a unique id (21 url-safe characters).
pub fn longid() -> String {
    nanoid::nanoid!()
}
