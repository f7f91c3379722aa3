pub mod channels;
pub mod dispatcher;
pub mod email;
