pub mod aht10;
pub mod bmp180;
pub mod hx711;
pub mod pca9548;
pub mod veml7700;
