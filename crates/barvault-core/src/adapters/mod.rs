mod questrade;

pub use questrade::QuestradeAdapter;
