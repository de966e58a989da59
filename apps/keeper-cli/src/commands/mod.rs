pub mod auth;
pub mod records;
pub mod sync;

pub use auth::cmd_register;
pub use records::{
    cmd_record_add, cmd_record_delete, cmd_record_list, cmd_record_show, cmd_record_update,
};
pub use sync::cmd_sync;
