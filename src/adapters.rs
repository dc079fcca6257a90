pub mod xml_signature;
