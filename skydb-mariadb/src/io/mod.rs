pub(crate) mod buf;
pub(crate) mod buf_mut;

pub(crate) use buf::Buf;
pub(crate) use buf_mut::BufMut;
