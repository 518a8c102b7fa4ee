mod cors;
mod limiter;

pub use cors::CorsMiddleware;
pub use limiter::Limiter;
