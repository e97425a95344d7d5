pub mod image;
pub mod image_view;
pub mod stage_ring;
