/**
 * Content Model
 * Page/section core: slug derivation, section-kind registry, raw-block composer
 */
pub mod compose;
pub mod reorder;
pub mod sections;
pub mod slug;
