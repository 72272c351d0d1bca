mod random;

pub use random::NormalGen;
