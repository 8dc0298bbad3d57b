mod handler;
mod model;

pub use handler::{get_me, login, register, update_password};
