pub mod ids;
pub mod url;
