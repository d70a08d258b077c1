pub mod error;
mod memory;
pub mod model;
mod postgres;
pub mod query;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use model::{
    Category, Customer, Favorite, Like, LineItem, LineItemTarget, NewCustomer, NewPayment,
    NewProduct, NewStore, Order, OrderStatus, PaymentInstrument, Product, ProfileUpdate, Rating,
    Recommendation, Removal, Store, Visibility, VisibilityFilter,
};
pub use postgres::PostgresLedger;
pub use query::ProductQuery;
pub use store::{LedgerStore, LedgerStoreExt};
