pub mod cloud_cli_adapter;
