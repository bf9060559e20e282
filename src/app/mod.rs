// 应用模块

mod core;

pub use self::core::App;
