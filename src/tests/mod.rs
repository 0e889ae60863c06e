
mod test_network;
