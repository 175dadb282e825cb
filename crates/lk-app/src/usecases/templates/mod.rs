mod store;

pub use store::TemplateStore;
