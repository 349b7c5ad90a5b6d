pub mod pdf_text_tool;
