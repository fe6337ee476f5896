pub mod load_file_writer;
pub mod package_reader;
