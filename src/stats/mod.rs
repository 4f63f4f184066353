pub mod dirichlet;
pub mod inverse_gamma;
pub mod inverse_wishart;
pub mod truncated;

pub use dirichlet::DirichletMultinomial;
pub use inverse_gamma::ScaledInverseGamma;
pub use inverse_wishart::InverseWishart;
pub use truncated::TruncatedGaussian;
