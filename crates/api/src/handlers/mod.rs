pub mod resourcepacks;
