mod inverted;

pub use inverted::InvertedWriter;
